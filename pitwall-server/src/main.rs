//! PitWall Server
//!
//! Runs the analytics engine against the active telemetry source and serves
//! its views over a REST and SSE API

use anyhow::{Context, Result};
use pitwall_server::{api, config::ServerConfig, manager, state};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting PitWall Server");

    let config = ServerConfig::from_env()?;
    info!(data_dir = %config.engine.data_dir.display(), "Track data directory");

    // Create application state
    let state = state::AppState::new(manager::build_engine(&config.engine));

    // Build the router
    let app = api::create_router(state.clone());

    // Start source manager in background
    let manager_task = tokio::spawn(manager::run(state.clone(), config.clone()));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Server listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    if let Err(e) = manager_task.await {
        warn!("Source manager task failed: {}", e);
    }
    info!("Server stopped");

    Ok(())
}

/// Resolve on ctrl-c, cancelling everything watching the token
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        // Serve until killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    token.cancel();
}
