//! ws-gateway: every WebSocket connection becomes a process.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                      GATEWAY                         │
//!                      │                                                      │
//!   Upgrade request    │  ┌─────────┐    ┌──────────────┐    ┌─────────────┐  │
//!   ───────────────────┼─▶│  http   │───▶│   session    │───▶│   process   │  │
//!                      │  │ server  │    │ remote / url │    │ acquisition │  │
//!                      │  └─────────┘    │     env      │    └──────┬──────┘  │
//!                      │                 └──────────────┘           │         │
//!                      │                                            ▼         │
//!   WebSocket frames   │  ┌───────────┐      ┌──────┐      ┌───────────────┐  │
//!   ◀──────────────────┼─▶│ websocket │◀────▶│ pump │◀────▶│ process       │◀─┼──▶ child
//!                      │  │ endpoint  │      └──────┘      │ endpoint      │  │   (pipes or
//!                      │  └───────────┘                    └───────────────┘  │    unix socket)
//!                      │                                                      │
//!                      │   config · observability · lifecycle                 │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;

use ws_gateway::config::Cli;
use ws_gateway::observability::{logging, metrics};
use ws_gateway::{GatewayServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().load()?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ws-gateway starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = GatewayServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
