use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use laundry_flow::config::StoreBackend;
use laundry_flow::{
    build_notifier, init_telemetry, open_store, serve, shutdown_telemetry, LaundryConfig,
    WorkflowEngine, WorkflowOptions,
};

#[derive(Parser)]
#[command(name = "laundry-flow")]
#[command(about = "Track laundry from intake to delivery")]
#[command(long_about = "laundry-flow moves laundry contacts through in-work, ready-for-delivery and \
                       history, optionally texting the customer at each step. Run without a \
                       subcommand to start the HTTP server.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Record store backend: memory or sqlite
        #[arg(long, value_parser = parse_backend)]
        store: Option<StoreBackend>,
        /// Database URL for the sqlite backend
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Print every partition of the configured store as JSON
    Status,
    /// Show the effective configuration
    Config {
        /// Write the configuration to this file instead of printing it
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn parse_backend(value: &str) -> Result<StoreBackend, String> {
    match value {
        "memory" => Ok(StoreBackend::Memory),
        "sqlite" => Ok(StoreBackend::Sqlite),
        other => Err(format!("unknown store backend '{other}' (expected memory or sqlite)")),
    }
}

async fn build_engine(config: &LaundryConfig) -> Result<WorkflowEngine> {
    let store = open_store(&config.store).await?;
    let notifier = build_notifier(&config.notifier)?;
    Ok(WorkflowEngine::new(
        store,
        notifier,
        WorkflowOptions::from_config(config),
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = laundry_flow::config()?.clone();

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        store: None,
        database_url: None,
    }) {
        Commands::Serve {
            host,
            port,
            store,
            database_url,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(store) = store {
                config.store.backend = store;
            }
            if let Some(url) = database_url {
                config.store.url = url;
            }

            init_telemetry(&config.observability)?;
            if let Some(path) = laundry_flow::config::loaded_env_file() {
                tracing::info!(path = %path.display(), "Loaded environment variables from .env file");
            }
            let result = tokio::runtime::Runtime::new()?.block_on(async {
                let engine = build_engine(&config).await?;
                serve(&config.server, engine).await
            });
            shutdown_telemetry();
            result
        }
        Commands::Status => tokio::runtime::Runtime::new()?.block_on(async {
            let engine = build_engine(&config).await?;
            let snapshot = engine.status().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            engine.store().close().await;
            Ok(())
        }),
        Commands::Config { write } => {
            match write {
                Some(path) => {
                    config.save_to_file(&path)?;
                    println!("Configuration written to {}", path.display());
                }
                None => print!("{}", config.to_toml()?),
            }
            Ok(())
        }
    }
}
