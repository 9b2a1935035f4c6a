//! Aegis identity server entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod config;

#[derive(Parser, Debug)]
#[command(name = "aegis-server", about = "Aegis identity server", version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config/aegis.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %cli.config.display(), "Starting Aegis identity server");
    bootstrap::run(config).await
}
