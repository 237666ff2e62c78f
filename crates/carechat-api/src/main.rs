//! CareChat API server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p carechat-api
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use anyhow::Context;
use carechat_common::{try_init_tracing, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!("Starting CareChat API Server...");
    let config = AppConfig::from_env().context("failed to load configuration")?;
    info!(
        env = ?config.app.env,
        address = %config.api.address(),
        fanout = ?config.gateway.fanout,
        "Configuration loaded"
    );

    carechat_api::run(config).await.context("API server failed")?;
    Ok(())
}
