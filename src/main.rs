use anyhow::Result;
use clap::Parser;
use tracing::info;

use waterwatch::cli::{handle_command, Cli};
use waterwatch::config;
use waterwatch::error_context::{self, ErrorContextExt};
use waterwatch::metrics::init_metrics_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment overrides such as RUST_LOG
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    info!("Using configuration file: {:?}", config_path);

    let config = config::load_config_or_default(&config_path)
        .context_fmt(|| error_context::config::load(&config_path.display().to_string()))?;

    init_metrics_config(config.metrics.clone());
    info!(
        "Cache backend: {:?}, refresh schedule: {}",
        config.storage.backend, config.refresh.schedule
    );

    handle_command(cli.command, config).await
}
