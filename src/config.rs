use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const CONFIG_FILE: &str = "laundry-flow.toml";
const ENV_PREFIX: &str = "LAUNDRY_FLOW";

/// Main configuration structure for laundry-flow
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LaundryConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Record store settings
    pub store: StoreConfig,
    /// SMS notification settings
    pub notifier: NotifierConfig,
    /// Workflow behavior switches
    pub workflow: WorkflowConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Listening port; `PORT` overrides it
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin. Accepts a list or a
    /// comma-separated string.
    #[serde(deserialize_with = "list_or_comma_separated")]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database URL for the sqlite backend
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Create the records table on startup
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierProvider {
    None,
    Twilio,
}

/// How transition notifications are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    /// Spawned after the state change; failures are logged only
    Background,
    /// Awaited; failures are reported to the caller, the state change stays
    Inline,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub provider: NotifierProvider,
    pub delivery: NotificationMode,
    /// Provider account identifier (`TWILIO_ACCOUNT_SID`)
    pub account_sid: Option<String>,
    /// Provider auth token (`TWILIO_AUTH_TOKEN`)
    pub auth_token: Option<String>,
    /// Sender phone number (`TWILIO_PHONE_NUMBER`)
    pub from_phone: Option<String>,
    pub api_base: String,
    pub timeout_seconds: u64,
    pub max_per_second: u32,
    /// Background sends allowed to queue before new ones are awaited inline
    pub max_pending: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Reject intake of a name/phone pair already in work
    pub duplicate_check: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "sqlite://laundry-flow.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            provider: NotifierProvider::None,
            delivery: NotificationMode::Background,
            account_sid: None,
            auth_token: None,
            from_phone: None,
            api_base: "https://api.twilio.com".to_string(),
            timeout_seconds: 10,
            max_per_second: 1,
            max_pending: 256,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            duplicate_check: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl LaundryConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (laundry-flow.toml)
    /// 3. Environment variables (prefixed with LAUNDRY_FLOW__)
    /// 4. PORT and TWILIO_* variables
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE), None, |key| std::env::var(key).ok())
    }

    /// `load` with an explicit file path, prefixed-variable source and lookup
    /// for the well-known variables. `env: None` reads the process environment.
    pub fn load_from<F>(
        file: &Path,
        env: Option<config::Map<String, String>>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder().add_source(Config::try_from(&LaundryConfig::default())?);

        if file.exists() {
            builder = builder.add_source(File::from(file));
        }

        // Values stay strings; serde converts numeric and boolean fields. Phone
        // numbers such as "+15550000" must not be parsed as integers.
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .source(env),
        );

        let config = builder.build()?;
        let mut laundry_config: LaundryConfig = config.try_deserialize()?;
        laundry_config.apply_well_known_env(lookup)?;

        Ok(laundry_config)
    }

    /// Apply the conventional variables the hosting platform and SMS provider
    /// documentation use, looked up through `lookup`.
    pub fn apply_well_known_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT value '{}': {}", port, e))?;
        }

        if self.notifier.account_sid.is_none() {
            self.notifier.account_sid = lookup("TWILIO_ACCOUNT_SID");
        }
        if self.notifier.auth_token.is_none() {
            self.notifier.auth_token = lookup("TWILIO_AUTH_TOKEN");
        }
        if self.notifier.from_phone.is_none() {
            self.notifier.from_phone = lookup("TWILIO_PHONE_NUMBER");
        }

        Ok(())
    }

    /// Render the configuration as TOML with secrets masked
    pub fn to_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        if redacted.notifier.auth_token.is_some() {
            redacted.notifier.auth_token = Some("********".to_string());
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }

    /// Save configuration to file. The auth token is left out; supply it via
    /// `TWILIO_AUTH_TOKEN` or `LAUNDRY_FLOW__NOTIFIER__AUTH_TOKEN`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut persisted = self.clone();
        persisted.notifier.auth_token = None;
        let toml_content = toml::to_string_pretty(&persisted)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load a dotenv file if it exists, returning its path when it was read.
    /// Runs before logging is set up, so callers report the result.
    pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        dotenvy::from_path(path)?;
        Ok(Some(path.to_path_buf()))
    }
}

fn list_or_comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(items) => items,
        ListOrString::Csv(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

static ENV_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// The dotenv file read while loading the global configuration, if any
pub fn loaded_env_file() -> Option<&'static Path> {
    ENV_FILE.get().and_then(|path| path.as_deref())
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<LaundryConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // .env must be applied before the environment layer is read
        let _ = ENV_FILE.set(LaundryConfig::load_env_file(".env").ok().flatten());
        LaundryConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static LaundryConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
