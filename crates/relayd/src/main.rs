//! # relayd
//!
//! WebSocket relay server binary — starts one listening endpoint and
//! runs until interrupted.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::{EndpointRegistry, ServerConfig};
use tracing_subscriber::EnvFilter;

/// WebSocket relay server.
#[derive(Parser, Debug)]
#[command(name = "relayd", about = "WebSocket relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "19765")]
    port: u16,

    /// Handshake read timeout in seconds.
    #[arg(long, default_value = "10")]
    handshake_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        handshake_timeout_secs: args.handshake_timeout,
        ..ServerConfig::default()
    };

    let registry = EndpointRegistry::new();
    let port = registry
        .start(config)
        .await
        .context("Failed to start endpoint")?;
    tracing::info!(port, "relayd listening");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    registry.stop_all().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
