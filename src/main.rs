//! Reverse proxy binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!   Client Request        │  ┌────────┐   ┌─────────┐   ┌────────────┐   │
//!   ──────────────────────┼─▶│ axum   │──▶│ routing │──▶│ load       │   │
//!                         │  │ server │   │ (match) │   │ balancer   │   │
//!                         │  └────────┘   └─────────┘   └─────┬──────┘   │
//!                         │                                   ▼          │
//!   Client Response       │  ┌──────────────┐   ┌─────────────────────┐  │
//!   ◀─────────────────────┼──│ header rules │◀──│ transport (hyper)   │◀─┼── Backend
//!                         │  └──────────────┘   └─────────────────────┘  │
//!                         │        retry loop: resilience + health       │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_forwarder::config::{load_config, ProxyConfig};
use proxy_forwarder::lifecycle::{signals, Shutdown};
use proxy_forwarder::observability::{logging, metrics};
use proxy_forwarder::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "proxy-forwarder", version, about = "Path-routed reverse proxy")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if args.check {
        println!("configuration OK ({} upstream groups)", config.upstreams.len());
        return Ok(());
    }

    logging::init(&config.observability.log_level);
    tracing::info!("proxy-forwarder v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
