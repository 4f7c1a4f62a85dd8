//! HTTP surface of the workflow
//!
//! Both route naming schemes (`/addContact` and `/add-contact`, ...) are
//! mounted side by side and map to the same handlers.

pub mod handlers;
pub mod types;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::workflows::WorkflowEngine;

pub use types::{AddContactRequest, OperationResponse, TransitionRequest};

pub struct AppState {
    pub engine: WorkflowEngine,
}

impl AppState {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }
}

pub fn build_app(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/addContact", post(handlers::add_contact))
        .route("/add-contact", post(handlers::add_contact))
        .route("/markReady", post(handlers::mark_ready))
        .route("/mark-ready", post(handlers::mark_ready))
        .route("/markDelivered", post(handlers::mark_delivered))
        .route("/mark-delivered", post(handlers::mark_delivered))
        .route("/contactsInWork", get(handlers::contacts_in_work))
        .route(
            "/contactsReadyForDelivery",
            get(handlers::contacts_ready_for_delivery),
        )
        .route("/contactsHistory", get(handlers::contacts_history))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(config.cors_allowed_origins.clone()))
        .with_state(state)
}

/// Bind, serve until Ctrl+C/SIGTERM, then close the store
pub async fn serve(config: &ServerConfig, engine: WorkflowEngine) -> Result<()> {
    let state = Arc::new(AppState::new(engine.clone()));
    let app = build_app(state, config);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Server running on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    crate::shutdown::shutdown_services(&engine).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

fn create_cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    use tower_http::cors::Any;

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .into_iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    cors.max_age(Duration::from_secs(3600))
}
