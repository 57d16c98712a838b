//! OpenSimReplay Server
//!
//! Hosts the replay engine behind a REST control API and an SSE
//! notification stream

use anyhow::{Context, Result};
use osr_core::{ReplayConfig, ReplayEngine, SimulatedEncoder};
use osr_server::{api, manager, state, storage};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_BIND: &str = "0.0.0.0:9200";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting OpenSimReplay Server");

    let addr: SocketAddr = std::env::var("OSR_BIND")
        .unwrap_or_else(|_| DEFAULT_BIND.to_string())
        .parse()
        .context("OSR_BIND must be a socket address like 0.0.0.0:9200")?;
    let data_dir = std::env::var_os("OSR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(storage::default_data_dir);

    let store = storage::FileStore::new(&data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
    let engine = ReplayEngine::new(
        ReplayConfig::default(),
        Box::new(store),
        Box::new(SimulatedEncoder::default()),
    );

    // Create application state
    let state = state::AppState::new(engine);

    // Build the router
    let app = api::create_router(state.clone());

    // Start feed manager in background
    tokio::spawn(manager::run(state.clone()));

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: state::AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    state.shutdown.cancel();
}
