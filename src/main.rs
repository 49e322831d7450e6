//! Stratum CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use stratum_config::{load_config, AppConfig};
use stratum_monitor::{setup_logging, LogFormat};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_missing) = if cli.config.exists() {
        let config = load_config(&cli.config)
            .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
        (config, false)
    } else {
        (AppConfig::default(), true)
    };

    let filter = cli
        .log_level
        .map(|level| level.as_str().to_string())
        .unwrap_or_else(|| config.logging.filter());
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        config.logging.format
    };
    let _guard = setup_logging(&filter, format, config.logging.file.as_deref());

    if config_missing {
        warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        Commands::Backtest(args) => cli::commands::backtest::run(args, &config).await,
        Commands::Presets => cli::commands::presets::run(),
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config),
    }
}
