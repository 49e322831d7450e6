//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;
use stratum_config::load_config;
use stratum_engine::{PresetRegistry, RuleSet};

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    let rules: RuleSet = match &config.strategy.rules {
        Some(rules) => {
            rules.validate().context("Inline rule set is invalid")?;
            rules.clone()
        }
        None => PresetRegistry::new()
            .create(&config.strategy.preset, &config.strategy.parameters)
            .with_context(|| format!("Preset '{}' rejected its parameters", config.strategy.preset))?,
    };

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log filter: {}", config.logging.filter());
    println!("Rule set: {}", rules.name);
    println!("Warm-up bars: {}", rules.warmup_bars());
    println!("Margin call policy: {:?}", config.strategy.margin_call_policy);
    println!("Initial capital: ${}", config.backtest.initial_capital);
    println!(
        "Fees: ${} + {}%, slippage {}%",
        config.backtest.fee_fixed, config.backtest.fee_pct, config.backtest.slippage_pct
    );
    println!("Leverage: {}x", config.backtest.leverage);
    println!("Data directory: {}", config.backtest.data_dir.display());

    Ok(())
}
