//! Standalone gateway entry point
//!
//! ```bash
//! GATEWAY_FANOUT=redis cargo run -p carechat-gateway
//! ```

use anyhow::Context;
use carechat_common::{try_init_tracing, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "Gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting CareChat gateway...");

    let config = AppConfig::from_env().context("failed to load configuration")?;
    info!(
        env = ?config.app.env,
        address = %config.gateway.server.address(),
        "Configuration loaded"
    );

    carechat_gateway::run(config).await?;
    Ok(())
}
