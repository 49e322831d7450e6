//! Declarative rule sets.
//!
//! A [`RuleSet`] is plain data (TOML/JSON friendly): lists of conditions for
//! arming, confirming and cancelling an entry signal, plus the indicator,
//! bracket, sizing, universe and market-filter settings that go with them.

use serde::{Deserialize, Serialize};
use stratum_core::error::EngineError;
use stratum_core::types::Bar;
use stratum_indicators::MovingAverageKind;
use stratum_risk::{BracketConfig, RiskConfig};

use crate::instrument::InstrumentState;
use crate::universe::UniverseFilter;

/// A single predicate over an instrument's current bar and indicators.
/// Conditions whose inputs are not ready evaluate to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Close below the previous close
    RedCandle,
    /// Close above the previous close
    GreenCandle,
    LowBelowLowerBand,
    CloseBelowLowerBand,
    RsiBelow { threshold: f64 },
    RsiAbove { threshold: f64 },
    /// Bollinger band width, in percent of the middle band, above `threshold`
    BandWidthAbove { threshold: f64 },
    AtrAbove { threshold: f64 },
    /// Rate of change (percent) within `[min, max]`
    RocBetween { min: f64, max: f64 },
    RocBelow { threshold: f64 },
    /// Current rate of change above its value `lag` bars ago
    RocRisingFrom { lag: usize },
    /// Volume at least `multiplier` times the average volume
    VolumeSurge { multiplier: f64 },
    /// Open at least `min_pct` percent below the previous close
    GapDown { min_pct: f64 },
    /// Close above the high of the bar that armed the signal
    CloseAboveArmedHigh,
    /// Close above the slow simple moving average
    CloseAboveSma,
}

impl Condition {
    pub fn holds(&self, state: &InstrumentState, armed: Option<&Bar>) -> bool {
        let Some(bar) = state.bar() else {
            return false;
        };
        let prev = state.previous_bar();

        match *self {
            Condition::RedCandle => prev.is_some_and(|p| bar.close < p.close),
            Condition::GreenCandle => prev.is_some_and(|p| bar.close > p.close),
            Condition::LowBelowLowerBand => state.bands().is_some_and(|b| bar.low < b.lower),
            Condition::CloseBelowLowerBand => state.bands().is_some_and(|b| bar.close < b.lower),
            Condition::RsiBelow { threshold } => state.rsi().is_some_and(|v| v < threshold),
            Condition::RsiAbove { threshold } => state.rsi().is_some_and(|v| v > threshold),
            Condition::BandWidthAbove { threshold } => {
                state.bands().is_some_and(|b| b.bandwidth > threshold)
            }
            Condition::AtrAbove { threshold } => state.atr().is_some_and(|v| v > threshold),
            Condition::RocBetween { min, max } => {
                state.roc(0).is_some_and(|v| (min..=max).contains(&v))
            }
            Condition::RocBelow { threshold } => state.roc(0).is_some_and(|v| v < threshold),
            Condition::RocRisingFrom { lag } => match (state.roc(0), state.roc(lag)) {
                (Some(now), Some(then)) => now > then,
                _ => false,
            },
            Condition::VolumeSurge { multiplier } => state
                .average_volume()
                .is_some_and(|avg| avg > 0.0 && bar.volume >= multiplier * avg),
            Condition::GapDown { min_pct } => prev.is_some_and(|p| {
                p.close > 0.0 && (p.close - bar.open) / p.close * 100.0 >= min_pct
            }),
            Condition::CloseAboveArmedHigh => armed.is_some_and(|a| bar.close > a.high),
            Condition::CloseAboveSma => state.sma().is_some_and(|v| bar.close > v),
        }
    }

    fn validate(&self, settings: &IndicatorSettings) -> Result<(), String> {
        match *self {
            Condition::RocBetween { min, max } if !(min <= max) => {
                Err(format!("roc_between min {min} exceeds max {max}"))
            }
            Condition::RocRisingFrom { lag } if lag == 0 || lag >= settings.roc_history => Err(
                format!(
                    "roc_rising_from lag {lag} must be in 1..{} (roc_history)",
                    settings.roc_history
                ),
            ),
            Condition::VolumeSurge { multiplier } if !(multiplier > 0.0) => {
                Err("volume_surge multiplier must be positive".into())
            }
            Condition::RsiBelow { threshold }
            | Condition::RsiAbove { threshold }
            | Condition::BandWidthAbove { threshold }
            | Condition::AtrAbove { threshold }
            | Condition::RocBelow { threshold }
                if !threshold.is_finite() =>
            {
                Err(format!("{self:?} threshold must be finite"))
            }
            _ => Ok(()),
        }
    }
}

/// Periods and smoothing for the per-instrument indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub rsi_smoothing: MovingAverageKind,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    pub atr_smoothing: MovingAverageKind,
    pub roc_period: usize,
    /// Rate-of-change values kept for lagged comparisons
    pub roc_history: usize,
    pub volume_period: usize,
    pub sma_period: usize,
    /// Bars of raw history kept per instrument
    pub history: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_smoothing: MovingAverageKind::Wilders,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            atr_smoothing: MovingAverageKind::Wilders,
            roc_period: 14,
            roc_history: 5,
            volume_period: 20,
            sma_period: 50,
            history: 30,
        }
    }
}

impl IndicatorSettings {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("rsi_period", self.rsi_period),
            ("bb_period", self.bb_period),
            ("atr_period", self.atr_period),
            ("roc_period", self.roc_period),
            ("roc_history", self.roc_history),
            ("volume_period", self.volume_period),
            ("sma_period", self.sma_period),
            ("history", self.history),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than 0"));
            }
        }
        if !(self.bb_std_dev > 0.0) {
            return Err("bb_std_dev must be positive".into());
        }
        if self.history < 2 {
            return Err("history must hold at least 2 bars".into());
        }
        Ok(())
    }

    /// Bars needed before every indicator is ready.
    pub fn warmup_bars(&self) -> usize {
        [
            self.rsi_period + 1,
            self.bb_period,
            self.atr_period,
            self.roc_period + self.roc_history,
            self.volume_period,
            self.sma_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Blocks new entries while a reference symbol closes above `max_close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFilter {
    pub symbol: String,
    pub max_close: f64,
}

impl MarketFilter {
    pub fn allows(&self, reference_close: Option<f64>) -> bool {
        reference_close.map_or(true, |close| close <= self.max_close)
    }
}

fn default_confirmation_window() -> usize {
    1
}

/// Complete declarative strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// All must hold on a bar for the signal to arm
    pub trigger: Vec<Condition>,
    /// All must hold on a later bar for the signal to confirm; empty confirms
    /// on the next bar
    #[serde(default)]
    pub confirmation: Vec<Condition>,
    /// Any one holding disarms the signal
    #[serde(default)]
    pub cancel: Vec<Condition>,
    /// Bars an armed signal may wait for confirmation; 0 waits until cancelled
    #[serde(default = "default_confirmation_window")]
    pub confirmation_window: usize,
    #[serde(default)]
    pub indicators: IndicatorSettings,
    #[serde(default)]
    pub bracket: BracketConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub market_filter: Option<MarketFilter>,
    #[serde(default)]
    pub universe: UniverseFilter,
    /// Record indicator series for armed and invested instruments
    #[serde(default)]
    pub plot_indicators: bool,
}

impl RuleSet {
    /// Rule set with the given trigger and defaults everywhere else.
    pub fn new(name: impl Into<String>, trigger: Vec<Condition>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            trigger,
            confirmation: Vec::new(),
            cancel: Vec::new(),
            confirmation_window: default_confirmation_window(),
            indicators: IndicatorSettings::default(),
            bracket: BracketConfig::default(),
            risk: RiskConfig::default(),
            market_filter: None,
            universe: UniverseFilter::default(),
            plot_indicators: false,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| EngineError::InvalidRuleSet(format!("{}: {msg}", self.name));

        if self.trigger.is_empty() {
            return Err(invalid("trigger conditions must not be empty".into()));
        }
        if self.confirmation_window == 0 && self.cancel.is_empty() {
            return Err(invalid(
                "confirmation_window 0 needs at least one cancel condition".into(),
            ));
        }
        self.indicators.validate().map_err(invalid)?;
        for condition in self.trigger.iter().chain(&self.confirmation).chain(&self.cancel) {
            condition.validate(&self.indicators).map_err(invalid)?;
        }
        if self.trigger.contains(&Condition::CloseAboveArmedHigh) {
            return Err(invalid(
                "close_above_armed_high can only confirm an armed signal".into(),
            ));
        }
        self.bracket.validate().map_err(invalid)?;
        self.risk.sizing.validate().map_err(invalid)?;
        if self.risk.limits.max_positions == 0 {
            return Err(invalid("max_positions must be at least 1".into()));
        }
        if let Some(filter) = &self.market_filter {
            if filter.symbol.trim().is_empty() {
                return Err(invalid("market filter symbol must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Bars of history to replay into a newly added instrument.
    pub fn warmup_bars(&self) -> usize {
        self.indicators.warmup_bars()
    }
}
