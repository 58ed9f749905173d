//! Demo upstreams for trying the balancer locally.
//!
//! Each port answers `/` with a greeting naming the port and `/health` with `OK`.

use axum::{routing::get, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "mock-backends")]
#[command(about = "Start demo backends for the load balancer", long_about = None)]
struct Cli {
    /// Ports to listen on
    #[arg(default_values_t = [9001u16, 9002, 9003])]
    ports: Vec<u16>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

fn backend_router(port: u16) -> Router {
    let greeting = format!("Hello from port {}", port);
    Router::new()
        .route("/", get(move || async move { greeting }))
        .route("/health", get(|| async { "OK" }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut servers = JoinSet::new();

    for port in cli.ports {
        let listener = TcpListener::bind((cli.host.as_str(), port)).await?;
        tracing::info!(address = %listener.local_addr()?, "Mock backend listening");
        servers.spawn(async move { axum::serve(listener, backend_router(port)).await });
    }

    while let Some(result) = servers.join_next().await {
        if let Err(e) = result? {
            tracing::error!(error = %e, "Mock backend stopped");
        }
    }
    Ok(())
}
