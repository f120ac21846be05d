//! Mesh gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                       GATEWAY                        │
//!   Client Request   │  ┌────────┐   ┌──────────┐   ┌─────────────────────┐ │
//!   ─────────────────┼─▶│  http  │──▶│ routing  │──▶│ dispatch (breaker + │─┼──▶ Service
//!                    │  │ server │   │  table   │   │ registry + timeout) │ │
//!                    │  └───┬────┘   └──────────┘   └──────────┬──────────┘ │
//!                    │      │                                  │            │
//!                    │      ▼                                  ▼            │
//!                    │  ┌───────────┐                   ┌─────────────┐     │
//!                    │  │ aggregate │──────────────────▶│  registry   │     │
//!                    │  │ dashboard │                   │ store + file│     │
//!                    │  │  search   │                   └──────▲──────┘     │
//!                    │  └───────────┘                          │            │
//!                    │            ┌────────────────┐  ┌────────┴───────┐    │
//!                    │            │ health monitor │  │ stale sweeper  │    │
//!                    │            └────────────────┘  └────────────────┘    │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use mesh_gateway::config::{load_config, watcher::RouteWatcher, GatewayConfig};
use mesh_gateway::lifecycle::shutdown_signal;
use mesh_gateway::observability::{logging, metrics};
use mesh_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "mesh-gateway", version, about = "Service registry and aggregating API gateway")]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mesh-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        registry = ?config.registry.path,
        health_checks = config.health_check.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Route reloads; the handle must stay alive for the watcher to run.
    let (watcher, route_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = RouteWatcher::new(path);
            (Some(watcher.start()?), updates)
        }
        None => (None, tokio::sync::mpsc::unbounded_channel().1),
    };

    let server = GatewayServer::from_config(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, route_updates, server_shutdown).await?;

    drop(watcher);
    tracing::info!("Shutdown complete");
    Ok(())
}
