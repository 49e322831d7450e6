//! Configuration management.

mod settings;

pub use config::ConfigError;
pub use settings::{AppConfig, AppSettings, BacktestSettings, LoggingConfig, StrategySettings};

use config::{Config, Environment, File};
use std::path::Path;

/// Environment variable prefix; `STRATUM__BACKTEST__LEVERAGE=2` sets `backtest.leverage`.
pub const ENV_PREFIX: &str = "STRATUM";

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = config.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
