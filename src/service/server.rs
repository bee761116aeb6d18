use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use crm_kanban_core::ControllerOptions;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState, SharedBackend};
use super::ws;

/// Configuration for the board-session server.
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
    pub controller: ControllerOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            dev_mode: false,
            controller: ControllerOptions::default(),
        }
    }
}

/// Build the full application router with API and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router()
        .route(
            "/ws",
            get(move |ws_upgrade| ws::ws_handler_with_sender(ws_upgrade, ws_tx)),
        )
        .with_state(state)
}

/// Load every board, then serve until Ctrl+C.
pub async fn start_server(config: ServerConfig, backend: SharedBackend) -> Result<()> {
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    let state = Arc::new(AppState::new(backend, config.controller, ws_tx));
    state.load_all().await;

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, dev_mode = config.dev_mode, "board server listening");
    println!("CRM kanban boards running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
