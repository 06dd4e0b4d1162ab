//! Rampart Server - Main entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rampart_api::{create_router, EngineConfig};
use rampart_keystore::{KeyStore, MemoryKeyStore};

#[derive(Parser)]
#[command(name = "rampart-server")]
#[command(about = "Rampart - RSA key management over HTTP")]
#[command(version)]
struct Cli {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8300", env = "RAMPART_BIND_ADDRESS")]
    bind: String,

    /// Log every request and response. Takes effect without `RUST_LOG`; an
    /// explicit `RUST_LOG` replaces the default filter.
    #[arg(short, long, env = "RAMPART_VERBOSE")]
    verbose: bool,

    /// Enable development mode (generates a key at start-up)
    #[arg(long, env = "RAMPART_DEV_MODE")]
    dev: bool,

    /// Size of the development key in bits
    #[arg(long, default_value_t = 2048, requires = "dev")]
    dev_key_bits: usize,
}

/// Log filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,rampart_api=debug,tower_http=debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .init();

    tracing::info!("Starting Rampart server...");
    tracing::info!("Bind address: {}", cli.bind);

    let store = Arc::new(MemoryKeyStore::new());

    if cli.dev {
        tracing::warn!("Development mode enabled - DO NOT USE IN PRODUCTION");
        let id = store
            .generate(cli.dev_key_bits)
            .await
            .context("failed to generate development key")?;
        let key = store
            .get(id.as_str())
            .await
            .context("development key vanished after generation")?;
        tracing::info!(id = %id, bits = cli.dev_key_bits, "Development key ready");
        tracing::debug!(public = %store.public_key_json(&key), "Development public key");
    }

    let app = create_router(
        store,
        EngineConfig {
            verbose: cli.verbose,
        },
    );

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "Rampart server started successfully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
