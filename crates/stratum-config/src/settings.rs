//! Configuration structures.

use chrono::NaiveDate;
use config::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stratum_backtest::BacktestConfig;
use stratum_broker::{FeeModel, PaperBrokerConfig, SlippageModel};
use stratum_core::types::Parameters;
use stratum_engine::RuleSet;
use stratum_monitor::{LogFormat, Verbosity};
use stratum_risk::MarginCallPolicy;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        if self.strategy.preset.trim().is_empty() && self.strategy.rules.is_none() {
            return Err(ConfigError::Message(
                "strategy: set either `preset` or an inline `rules` table".to_string(),
            ));
        }
        Ok(())
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "stratum".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit `EnvFilter` directive; takes precedence over `verbosity`
    pub level: Option<String>,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// 0 off, 1 key events, 2 verbose, 3 every bar
    pub verbosity: Verbosity,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Pretty,
            file: None,
            verbosity: Verbosity::KeyEvents,
        }
    }
}

impl LoggingConfig {
    pub fn filter(&self) -> String {
        self.level
            .clone()
            .unwrap_or_else(|| self.verbosity.directive())
    }
}

/// Backtest settings. Fee and slippage percentages are in percent units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_capital: Decimal,
    pub fee_fixed: Decimal,
    pub fee_pct: Decimal,
    pub slippage_pct: Decimal,
    pub leverage: Decimal,
    /// Fraction of gross exposure equity must cover
    pub maintenance_margin: Decimal,
    /// Directory of `<SYMBOL>.csv` bar files
    pub data_dir: PathBuf,
    pub fundamentals: Option<PathBuf>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            fee_fixed: dec!(1),
            fee_pct: dec!(0.1),
            slippage_pct: dec!(0.05),
            leverage: Decimal::ONE,
            maintenance_margin: dec!(0.25),
            data_dir: PathBuf::from("data"),
            fundamentals: None,
            start: None,
            end: None,
        }
    }
}

impl BacktestSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Message(format!("backtest: {msg}")))
            }
        };
        check(self.initial_capital > Decimal::ZERO, "initial_capital must be positive")?;
        check(
            self.fee_fixed >= Decimal::ZERO && self.fee_pct >= Decimal::ZERO,
            "fees cannot be negative",
        )?;
        check(self.slippage_pct >= Decimal::ZERO, "slippage_pct cannot be negative")?;
        check(self.leverage >= Decimal::ONE, "leverage must be at least 1")?;
        check(
            self.maintenance_margin > Decimal::ZERO && self.maintenance_margin <= Decimal::ONE,
            "maintenance_margin must be in (0, 1]",
        )?;
        if let (Some(start), Some(end)) = (self.start, self.end) {
            check(start <= end, "start is after end")?;
        }
        Ok(())
    }

    pub fn to_backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            broker: PaperBrokerConfig {
                initial_capital: self.initial_capital,
                fees: FeeModel::new(self.fee_fixed, self.fee_pct),
                slippage: SlippageModel::new(self.slippage_pct),
                leverage: self.leverage,
                maintenance_margin: self.maintenance_margin,
            },
            start: self.start,
            end: self.end,
        }
    }
}

/// Which strategy to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Preset name, used unless `rules` is given
    pub preset: String,
    /// Preset parameter overrides
    pub parameters: Parameters,
    pub margin_call_policy: MarginCallPolicy,
    /// Inline rule set replacing the preset
    pub rules: Option<RuleSet>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            preset: "roc_rebound".to_string(),
            parameters: Parameters::new(),
            margin_call_policy: MarginCallPolicy::default(),
            rules: None,
        }
    }
}
