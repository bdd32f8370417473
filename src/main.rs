//! chatfsd - a Unix-filesystem metaphor over a chat service.
//!
//! Directories and rooms form a path-addressed namespace; each room is a
//! persistent append-only message log with live fan-out to joined sessions.

mod config;
mod db;
mod error;
mod handlers;
mod network;
mod path;
mod proto;
mod state;

use crate::config::Config;
use crate::db::Database;
use crate::handlers::Context;
use crate::network::Gateway;
use crate::state::StreamManager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration (optional file argument, env port override)
    let config_path = std::env::args().nth(1);
    let config = Config::load_or_default(config_path.as_deref()).map_err(|e| {
        error!(path = ?config_path, error = %e, "Failed to load config");
        e
    })?;
    let addr = config.listen_addr()?;

    info!(%addr, db = %config.database.path, "Starting chatfsd");

    // Initialize storage (bootstraps the schema and seeds the root)
    let db = Database::new(&config.database.path).await?;

    // Shared live state
    let streams = Arc::new(StreamManager::new());
    let ctx = Context {
        db,
        streams: Arc::clone(&streams),
    };

    let shutdown = CancellationToken::new();
    let gateway = Gateway::bind(addr, ctx, shutdown.clone()).await?;
    let server = tokio::spawn(gateway.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Cancel every RPC, drain connections, then drain fan-out workers.
    shutdown.cancel();
    server.await??;
    streams.shutdown().await;

    Ok(())
}
