//! Serial Bridge - Main Entry Point

use bridge_daemon::{init_logging, run, DaemonConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = DaemonConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Serial Bridge v{} ===", env!("CARGO_PKG_VERSION"));

    run(config).await
}
