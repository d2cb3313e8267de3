//! shipquote maintenance CLI.
//!
//! Works directly on the cache database, without the server, so it can run
//! from cron (e.g. `shipquote cleanup` for the nightly expiry sweep).

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shipquote_core::{AppConfig, CacheDb, RateQuery, ShippingCache};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shipquote", about = "Inspect and maintain the shipping quote cache", version)]
struct Cli {
    /// Cache database path. Falls back to SHIPQUOTE_DB_PATH or the configured default.
    #[arg(long = "db", value_name = "path", global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print cache counters as JSON.
    Stats,
    /// Delete expired rate rows.
    Cleanup,
    /// Delete every cached row for one rate key.
    Invalidate {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        /// Parcel weight in grams.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        weight: u32,
        #[arg(long)]
        courier: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(path) = cli.db_path {
        config.db_path = path;
    }

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let cache = ShippingCache::new(db.clone(), config.cache_config());

    let outcome = run(&cache, cli.command).await;
    db.close().await?;
    println!("{}", outcome?);
    Ok(())
}

/// Execute one command and return what to print.
async fn run(cache: &ShippingCache, command: Command) -> Result<String> {
    match command {
        Command::Stats => {
            let stats = cache.stats().await?;
            Ok(serde_json::to_string_pretty(&stats)?)
        }
        Command::Cleanup => {
            let deleted = cache.cleanup_expired().await?;
            Ok(format!("deleted={deleted}"))
        }
        Command::Invalidate { origin, destination, weight, courier } => {
            let query = RateQuery::new(origin, destination, weight, courier);
            query.validate()?;
            if !cache.invalidate(&query).await {
                bail!("failed to invalidate cache entries");
            }
            Ok("invalidated=true".to_string())
        }
    }
}
