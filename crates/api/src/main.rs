//! Ocular Disease Classification API - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    let _log_guard = init_logging(&settings)?;

    info!("=== Ocular Classification API v{} ===", env!("CARGO_PKG_VERSION"));
    settings.validate().context("invalid configuration")?;

    run_server(settings).await
}
