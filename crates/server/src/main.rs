//! shipquote server entry point.
//!
//! Boots the HTTP API in front of the shipping vendor. Logging goes to
//! stderr as JSON.

use anyhow::{Context, Result};
use shipquote_client::VendorClient;
use shipquote_core::{AppConfig, CacheDb, ShippingCache};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let vendor = VendorClient::from_app_config(&config).context("failed to build vendor client")?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let cache = ShippingCache::new(db.clone(), config.cache_config());
    let state = handler::AppState::new(cache, Arc::new(vendor));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, db = %config.db_path.display(), "Starting shipquote server");

    axum::serve(listener, handler::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, closing cache");
    db.close().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
