//! lambda-proxy binary entry point.

use clap::Parser;
use lambda_proxy::runtime::{Options, ProxyServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Lambda proxy");

    let options = Options::parse();
    ProxyServer::new(options).run().await?;

    tracing::info!("Exiting Lambda proxy");
    Ok(())
}
