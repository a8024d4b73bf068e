// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! subgauge - subscription file server with live VPS usage annotation.
//!
//! Loads the configuration, builds the provider registry and the
//! response assembler, and serves the subscription routes until a
//! shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use subgauge_providers::ProviderRegistry;
use subgauge_server::{
    Coalescer, DirStore, ResponseAssembler, RootConfig, TierCaches, router,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// subgauge server.
#[derive(Parser)]
#[command(name = "subgauge")]
#[command(about = "Subscription file server with live VPS usage annotation")]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long = "conf", env = "SUBGAUGE_CONF", default_value = "config/config.yml")]
    conf: PathBuf,
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("subgauge={level},tower_http={level}")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RootConfig::load(&cli.conf)
        .with_context(|| format!("failed to load {}", cli.conf.display()))?;
    setup_logging(&config.log.level);

    let registry = ProviderRegistry::builtin();
    let routes = config
        .build_routes(&registry)
        .context("invalid route configuration")?;
    info!(routes = routes.len(), "route table built");

    let store = Arc::new(DirStore::new(&config.global.storage.subscription_dir));
    let assembler = ResponseAssembler::new(
        routes,
        &registry,
        store,
        TierCaches::new(),
        Coalescer::new(),
    )
    .context("failed to build response assembler")?;

    let app = router(Arc::new(assembler), config.server_timeout());

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "server start");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stop");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        _ = terminate => {},
    }
}
