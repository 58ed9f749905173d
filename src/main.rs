//! HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::dispatch ──▶ load_balancer::Selector
//!                                          │                    │
//!                                          │                    ▼
//!                                          │              load_balancer::Pool
//!                                          ▼
//!     Client Response ◀──────────── http::forward ◀──────────── Backend Server
//!
//!     Cross-cutting: config, health (active probes), observability, admin, lifecycle
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use lb_proxy::config::load_config;
use lb_proxy::lifecycle::{signals::wait_for_signal, Shutdown};
use lb_proxy::observability::{logging::init_logging, metrics::init_metrics};
use lb_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "lb-proxy")]
#[command(about = "HTTP load balancer", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    if cli.check {
        println!("{}: OK", cli.config.display());
        return Ok(());
    }

    init_logging(&config.observability);
    tracing::info!("lb-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(name) = &config.algorithm_fallback {
        tracing::warn!(configured = %name, "Unknown algorithm, falling back to random");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        algorithm = %config.algorithm,
        backends = config.backends.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
