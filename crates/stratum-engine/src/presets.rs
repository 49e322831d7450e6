//! Built-in rule sets, configurable through string-keyed parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stratum_core::error::EngineError;
use stratum_core::types::Parameters;
use stratum_indicators::MovingAverageKind;
use stratum_risk::{PortfolioLimits, PositionSizingMethod, RiskConfig};

use crate::rules::{Condition, IndicatorSettings, MarketFilter, RuleSet};
use crate::universe::{CapTier, Sector, UniverseFilter};

/// A registered preset with its default parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetInfo {
    pub name: String,
    pub description: String,
    pub defaults: Parameters,
}

type Builder = fn(&Parameters) -> Result<RuleSet, EngineError>;

/// Registry of the built-in presets.
pub struct PresetRegistry {
    presets: Vec<(PresetInfo, Builder)>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self {
            presets: vec![
                (
                    PresetInfo {
                        name: "roc_rebound".into(),
                        description: "Buys small caps rebounding after a sharp rate-of-change drop on a volume surge"
                            .into(),
                        defaults: roc_rebound_defaults(),
                    },
                    roc_rebound as Builder,
                ),
                (
                    PresetInfo {
                        name: "bollinger_rsi_reversal".into(),
                        description: "Buys the first strong green candle after an oversold close below the lower band"
                            .into(),
                        defaults: bollinger_rsi_defaults(),
                    },
                    bollinger_rsi_reversal as Builder,
                ),
                (
                    PresetInfo {
                        name: "gap_down_reversal".into(),
                        description: "Buys the reversal after a high-volume gap down while volatility is calm"
                            .into(),
                        defaults: gap_down_defaults(),
                    },
                    gap_down_reversal as Builder,
                ),
            ],
        }
    }

    pub fn list(&self) -> Vec<&PresetInfo> {
        self.presets.iter().map(|(info, _)| info).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PresetInfo> {
        self.presets
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(info, _)| info)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Build and validate a preset. Keys missing from `params` take the
    /// preset's defaults.
    pub fn create(&self, name: &str, params: &Parameters) -> Result<RuleSet, EngineError> {
        let (_, build) = self
            .presets
            .iter()
            .find(|(info, _)| info.name == name)
            .ok_or_else(|| EngineError::UnknownPreset(name.to_string()))?;
        let rules = build(params)?;
        rules.validate()?;
        Ok(rules)
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decimal(params: &Parameters, key: &str, default: f64) -> Result<Decimal, EngineError> {
    let value = params.get_f64(key, default)?;
    Decimal::try_from(value).map_err(|e| EngineError::InvalidParameter {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn cap_tiers(params: &Parameters, default: &[&str]) -> Result<Vec<CapTier>, EngineError> {
    params
        .get_list("cap_tiers", default)
        .iter()
        .map(|s| s.parse())
        .collect()
}

fn sectors(params: &Parameters, key: &str, default: &[&str]) -> Result<Vec<Sector>, EngineError> {
    params.get_list(key, default).iter().map(|s| s.parse()).collect()
}

fn optional_usize(params: &Parameters, key: &str, default: usize) -> Result<Option<usize>, EngineError> {
    let value = params.get_usize(key, default)?;
    Ok((value > 0).then_some(value))
}

fn roc_rebound_defaults() -> Parameters {
    Parameters::new()
        .with("roc_period", 14_i64)
        .with("roc_min", -40.0)
        .with("roc_max", -15.0)
        .with("volume_surge_threshold", 1.5)
        .with("volume_period", 20_i64)
        .with("atr_period", 14_i64)
        .with("stop_atr_multiple", 2.5)
        .with("target_atr_multiple", 1.0)
        .with("max_holding_days", 15_i64)
        .with("trade_allocation_pct", 1.0)
        .with("max_positions", 10_i64)
        .with("vix_symbol", "VIX")
        .with("vix_threshold", 20.0)
        .with("use_vix_filter", true)
        .with("cap_tiers", "small")
        .with("sector_tiers", "healthcare")
        .with("top_by_dollar_volume", 1000_i64)
        .with("plot_indicators", false)
}

fn roc_rebound(params: &Parameters) -> Result<RuleSet, EngineError> {
    let market_filter = params
        .get_bool("use_vix_filter", true)?
        .then(|| -> Result<MarketFilter, EngineError> {
            Ok(MarketFilter {
                symbol: params.get_string("vix_symbol", "VIX"),
                max_close: params.get_f64("vix_threshold", 20.0)?,
            })
        })
        .transpose()?;

    Ok(RuleSet {
        description: "ROC rebound".into(),
        confirmation: Vec::new(),
        cancel: Vec::new(),
        confirmation_window: 1,
        indicators: IndicatorSettings {
            roc_period: params.get_usize("roc_period", 14)?,
            roc_history: 4,
            volume_period: params.get_usize("volume_period", 20)?,
            atr_period: params.get_usize("atr_period", 14)?,
            atr_smoothing: MovingAverageKind::Simple,
            ..Default::default()
        },
        bracket: stratum_risk::BracketConfig {
            stop_atr_multiple: decimal(params, "stop_atr_multiple", 2.5)?,
            target_atr_multiple: decimal(params, "target_atr_multiple", 1.0)?,
            max_holding_days: Some(params.get_i64("max_holding_days", 15)?),
            max_holding_bars: None,
        },
        risk: RiskConfig {
            sizing: PositionSizingMethod::PercentCash {
                percent: decimal(params, "trade_allocation_pct", 1.0)?,
            },
            limits: PortfolioLimits {
                max_positions: params.get_usize("max_positions", 10)?,
                ..Default::default()
            },
            max_shares: None,
        },
        market_filter,
        universe: UniverseFilter {
            require_fundamentals: true,
            cap_tiers: cap_tiers(params, &["small"])?,
            sectors: sectors(params, "sector_tiers", &["healthcare"])?,
            top_by_dollar_volume: optional_usize(params, "top_by_dollar_volume", 1000)?,
            ..Default::default()
        },
        plot_indicators: params.get_bool("plot_indicators", false)?,
        ..RuleSet::new(
            "roc_rebound",
            vec![
                Condition::RocBetween {
                    min: params.get_f64("roc_min", -40.0)?,
                    max: params.get_f64("roc_max", -15.0)?,
                },
                Condition::RocRisingFrom { lag: 1 },
                Condition::RocRisingFrom { lag: 3 },
                Condition::VolumeSurge {
                    multiplier: params.get_f64("volume_surge_threshold", 1.5)?,
                },
            ],
        )
    })
}

fn bollinger_rsi_defaults() -> Parameters {
    Parameters::new()
        .with("bb_period", 30_i64)
        .with("bb_std_dev", 2.0)
        .with("bb_width_threshold", 0.3)
        .with("rsi_period", 14_i64)
        .with("rsi_threshold", 30.0)
        .with("atr_period", 14_i64)
        .with("atr_sl_multiplier", 3.0)
        .with("atr_tp_multiplier", 2.0)
        .with("position_timeout_bars", 2_i64)
        .with("max_position_size", 10.0)
        .with("max_positions", 10_i64)
        .with("etf", "SPY")
        .with("plot_indicators", false)
}

fn bollinger_rsi_reversal(params: &Parameters) -> Result<RuleSet, EngineError> {
    let width = params.get_f64("bb_width_threshold", 0.3)?;
    let etf = params.get_string("etf", "SPY");

    Ok(RuleSet {
        description: "Bollinger/RSI reversal".into(),
        confirmation: vec![
            Condition::GreenCandle,
            Condition::CloseAboveArmedHigh,
            Condition::BandWidthAbove { threshold: width },
        ],
        cancel: vec![Condition::RedCandle],
        confirmation_window: 0,
        indicators: IndicatorSettings {
            bb_period: params.get_usize("bb_period", 30)?,
            bb_std_dev: params.get_f64("bb_std_dev", 2.0)?,
            rsi_period: params.get_usize("rsi_period", 14)?,
            atr_period: params.get_usize("atr_period", 14)?,
            atr_smoothing: MovingAverageKind::Simple,
            ..Default::default()
        },
        bracket: stratum_risk::BracketConfig {
            stop_atr_multiple: decimal(params, "atr_sl_multiplier", 3.0)?,
            target_atr_multiple: decimal(params, "atr_tp_multiplier", 2.0)?,
            max_holding_days: None,
            max_holding_bars: optional_usize(params, "position_timeout_bars", 2)?,
        },
        risk: RiskConfig {
            sizing: PositionSizingMethod::PercentEquity {
                percent: decimal(params, "max_position_size", 10.0)?,
            },
            limits: PortfolioLimits {
                max_positions: params.get_usize("max_positions", 10)?,
                ..Default::default()
            },
            max_shares: None,
        },
        universe: UniverseFilter {
            etf: (!etf.is_empty()).then_some(etf),
            ..Default::default()
        },
        plot_indicators: params.get_bool("plot_indicators", false)?,
        ..RuleSet::new(
            "bollinger_rsi_reversal",
            vec![
                Condition::RedCandle,
                Condition::LowBelowLowerBand,
                Condition::RsiBelow {
                    threshold: params.get_f64("rsi_threshold", 30.0)?,
                },
                Condition::BandWidthAbove { threshold: width },
            ],
        )
    })
}

fn gap_down_defaults() -> Parameters {
    Parameters::new()
        .with("gap_threshold", 3.0)
        .with("volume_window", 20_i64)
        .with("volume_spike_multiplier", 1.5)
        .with("atr_period", 14_i64)
        .with("stop_atr_multiple", 1.5)
        .with("risk_reward", 2.0)
        .with("position_pct", 2.0)
        .with("max_positions", 10_i64)
        .with("vix_symbol", "VIXY")
        .with("vix_threshold", 25.0)
        .with("min_market_cap", 1e9)
        .with("max_market_cap", 1e11)
        .with("sectors", "healthcare,technology,consumer cyclical")
        .with("plot_indicators", false)
}

fn gap_down_reversal(params: &Parameters) -> Result<RuleSet, EngineError> {
    let stop = decimal(params, "stop_atr_multiple", 1.5)?;
    let risk_reward = decimal(params, "risk_reward", 2.0)?;

    Ok(RuleSet {
        description: "Gap-down reversal".into(),
        confirmation: vec![Condition::GreenCandle],
        cancel: Vec::new(),
        confirmation_window: 1,
        indicators: IndicatorSettings {
            volume_period: params.get_usize("volume_window", 20)?,
            atr_period: params.get_usize("atr_period", 14)?,
            ..Default::default()
        },
        bracket: stratum_risk::BracketConfig {
            stop_atr_multiple: stop,
            target_atr_multiple: stop * risk_reward,
            max_holding_days: None,
            max_holding_bars: None,
        },
        risk: RiskConfig {
            sizing: PositionSizingMethod::PercentEquity {
                percent: decimal(params, "position_pct", 2.0)?,
            },
            limits: PortfolioLimits {
                max_positions: params.get_usize("max_positions", 10)?,
                ..Default::default()
            },
            max_shares: None,
        },
        market_filter: Some(MarketFilter {
            symbol: params.get_string("vix_symbol", "VIXY"),
            max_close: params.get_f64("vix_threshold", 25.0)?,
        }),
        universe: UniverseFilter {
            min_market_cap: Some(params.get_f64("min_market_cap", 1e9)?),
            max_market_cap: Some(params.get_f64("max_market_cap", 1e11)?),
            sectors: sectors(
                params,
                "sectors",
                &["healthcare", "technology", "consumer cyclical"],
            )?,
            ..Default::default()
        },
        plot_indicators: params.get_bool("plot_indicators", false)?,
        ..RuleSet::new(
            "gap_down_reversal",
            vec![
                Condition::GapDown {
                    min_pct: params.get_f64("gap_threshold", 3.0)?,
                },
                Condition::VolumeSurge {
                    multiplier: params.get_f64("volume_spike_multiplier", 1.5)?,
                },
            ],
        )
    })
}
