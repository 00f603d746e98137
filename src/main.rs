use std::path::PathBuf;

use clap::Parser;

use api_gateway::config::load_config;
use api_gateway::lifecycle::signals;
use api_gateway::observability::{logging, metrics};
use api_gateway::{Gateway, GatewayError};

/// Authorizing API gateway.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "./configs/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.logger);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        addr = %config.addr,
        services = config.services.len(),
        "api-gateway starting"
    );

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(metrics_address = %addr, error = %e, "Failed to parse metrics address"),
        }
    }

    let gateway = Gateway::new(config)?;
    let handle = gateway.handle();
    tokio::spawn(async move {
        match signals::termination().await {
            Ok(_) => handle.shutdown(),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });

    gateway.run().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
