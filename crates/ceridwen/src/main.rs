//! Ceridwen — content pipeline orchestrator.
//!
//! Main entry point for the ceridwen server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ceridwen_engine::{EngineConfig, RunEngine, UnconfiguredExecutor};
use ceridwen_limiter::{AdmissionController, LimiterConfig};
use ceridwen_server::{Server, ServerConfig};
use ceridwen_store::{Database, LimitStore, RunStore};

/// Ceridwen — content pipeline orchestrator
#[derive(Parser)]
#[command(name = "ceridwen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, env = "CERIDWEN_DB", default_value = "ceridwen.db")]
    db: PathBuf,

    /// Address to bind the HTTP server to
    #[arg(long, env = "CERIDWEN_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Concurrent orchestration passes allowed
    #[arg(long, env = "CERIDWEN_RUN_SLOTS", default_value_t = 1)]
    run_slots: usize,

    /// Disable admission control on run endpoints
    #[arg(long)]
    no_rate_limit: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "ceridwen=debug,ceridwen_engine=debug,ceridwen_server=debug,ceridwen_limiter=debug,info"
    } else {
        "ceridwen=info,ceridwen_engine=info,ceridwen_server=info,ceridwen_limiter=info,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
                ),
        )
        .init();

    let db = Database::open(&cli.db)
        .with_context(|| format!("opening database at {}", cli.db.display()))?;
    info!(path = %cli.db.display(), "Database ready");

    let engine = RunEngine::new(
        RunStore::new(db.clone()),
        Arc::new(UnconfiguredExecutor),
        EngineConfig {
            run_slots: cli.run_slots,
            ..EngineConfig::default()
        },
    );

    let limiter = AdmissionController::new(LimitStore::new(db), LimiterConfig::from_env());

    let config = ServerConfig::default()
        .with_bind_address(cli.bind)
        .with_rate_limiting(!cli.no_rate_limit);

    Server::new(engine, limiter, config)
        .run()
        .await
        .context("server terminated")
}
