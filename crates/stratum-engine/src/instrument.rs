//! Per-instrument indicator and signal state.

use chrono::{DateTime, Utc};
use stratum_core::traits::{BarIndicator, StreamingIndicator};
use stratum_core::types::{Bar, BarSeries, RollingWindow};
use stratum_indicators::{Atr, BollingerBands, BollingerOutput, MovingAverage, Roc, Rsi};

use crate::rules::IndicatorSettings;

/// Where an instrument is in the arm/confirm cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SignalPhase {
    #[default]
    Idle,
    Armed {
        /// Bar that satisfied the trigger
        bar: Bar,
        armed_at: DateTime<Utc>,
        /// Later bars seen without confirmation
        bars_waited: usize,
    },
}

impl SignalPhase {
    pub fn is_armed(&self) -> bool {
        matches!(self, SignalPhase::Armed { .. })
    }
}

/// An entry order that has been submitted but not yet filled or rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub submitted_at: DateTime<Utc>,
    pub signal_price: f64,
}

/// Everything the engine tracks for one symbol in the universe.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    symbol: String,
    history: BarSeries,
    rsi: Rsi,
    bands: BollingerBands,
    atr: Atr,
    roc: Roc,
    roc_window: RollingWindow<f64>,
    volume_avg: MovingAverage,
    sma: MovingAverage,
    pub phase: SignalPhase,
    pub pending_entry: Option<PendingEntry>,
    bars_seen: usize,
    last_update: Option<i64>,
}

impl InstrumentState {
    pub fn new(symbol: impl Into<String>, settings: &IndicatorSettings) -> Self {
        let symbol = symbol.into();
        Self {
            history: BarSeries::with_capacity(symbol.clone(), settings.history),
            rsi: Rsi::with_kind(settings.rsi_period, settings.rsi_smoothing),
            bands: BollingerBands::new(settings.bb_period, settings.bb_std_dev),
            atr: Atr::with_kind(settings.atr_period, settings.atr_smoothing),
            roc: Roc::new(settings.roc_period),
            roc_window: RollingWindow::new(settings.roc_history),
            volume_avg: MovingAverage::simple(settings.volume_period),
            sma: MovingAverage::simple(settings.sma_period),
            phase: SignalPhase::Idle,
            pending_entry: None,
            bars_seen: 0,
            last_update: None,
            symbol,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Feed one bar. Bars at or before the last update are ignored.
    pub fn update(&mut self, bar: &Bar) -> bool {
        if self.last_update.is_some_and(|ts| bar.timestamp <= ts) {
            return false;
        }

        self.history.push(*bar);
        self.rsi.update(bar.close);
        self.bands.update(bar.close);
        self.atr.update_bar(bar);
        match self.roc.update(bar.close) {
            Some(roc) => self.roc_window.push(roc),
            // lagged comparisons must not span an undefined reading
            None => self.roc_window.clear(),
        }
        self.volume_avg.update(bar.volume);
        self.sma.update(bar.close);

        self.bars_seen += 1;
        self.last_update = Some(bar.timestamp);
        true
    }

    /// Replay history, oldest first.
    pub fn warm_up(&mut self, bars: &[Bar]) -> usize {
        bars.iter().filter(|bar| self.update(bar)).count()
    }

    pub fn bar(&self) -> Option<&Bar> {
        self.history.last()
    }

    pub fn previous_bar(&self) -> Option<&Bar> {
        self.history.previous()
    }

    pub fn history(&self) -> &BarSeries {
        &self.history
    }

    pub fn rsi(&self) -> Option<f64> {
        self.rsi.current()
    }

    pub fn bands(&self) -> Option<BollingerOutput> {
        self.bands.current()
    }

    pub fn atr(&self) -> Option<f64> {
        self.atr.current()
    }

    /// Rate of change `age` bars ago (0 = current bar).
    pub fn roc(&self, age: usize) -> Option<f64> {
        self.roc_window.get(age).copied()
    }

    pub fn average_volume(&self) -> Option<f64> {
        self.volume_avg.current()
    }

    pub fn sma(&self) -> Option<f64> {
        self.sma.current()
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    pub fn disarm(&mut self) {
        self.phase = SignalPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: i64, close: f64) -> Bar {
        Bar::new(day * 86_400_000, close, close + 1.0, close - 1.0, close, 1_000.0)
    }

    fn settings() -> IndicatorSettings {
        IndicatorSettings {
            rsi_period: 3,
            bb_period: 3,
            atr_period: 3,
            roc_period: 2,
            roc_history: 3,
            volume_period: 3,
            sma_period: 3,
            history: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_indicators_warm_up() {
        let mut state = InstrumentState::new("TEST", &settings());
        assert!(state.bar().is_none());
        assert!(state.roc(0).is_none());

        for day in 0..6 {
            state.update(&bar(day, 100.0 + day as f64));
        }

        assert_eq!(state.bars_seen(), 6);
        assert!(state.rsi().is_some());
        assert!(state.bands().is_some());
        assert!(state.atr().is_some());
        assert_eq!(state.average_volume(), Some(1_000.0));
        // closes 103, 104, 105 -> sma 104
        assert_eq!(state.sma(), Some(104.0));
        // roc(2) on 105 vs 103
        let latest = state.roc(0).unwrap();
        assert!((latest - 2.0 / 103.0 * 100.0).abs() < 1e-9);
        assert!(state.roc(2).is_some());
        assert!(state.roc(3).is_none());
        assert_eq!(state.history().len(), 5);
    }

    #[test]
    fn test_stale_bars_ignored() {
        let mut state = InstrumentState::new("TEST", &settings());
        assert!(state.update(&bar(2, 100.0)));
        assert!(!state.update(&bar(2, 101.0)));
        assert!(!state.update(&bar(1, 99.0)));
        assert_eq!(state.bars_seen(), 1);
        assert_eq!(state.bar().map(|b| b.close), Some(100.0));
    }

    #[test]
    fn test_zero_base_price_drops_roc_history() {
        let mut state = InstrumentState::new("TEST", &settings());
        for (day, close) in [100.0, 0.0, 90.0, 95.0].into_iter().enumerate() {
            state.update(&bar(day as i64, close));
        }
        // roc(2) of 95 is against the zero close
        assert!(state.roc(0).is_none());
        assert!(state.roc(1).is_none());

        state.update(&bar(4, 99.0));
        assert!(state.roc(0).is_some());
        assert!(state.roc(1).is_none());
    }

    #[test]
    fn test_warm_up_counts_applied_bars() {
        let mut state = InstrumentState::new("TEST", &settings());
        let bars: Vec<Bar> = (0..4).map(|d| bar(d, 50.0)).collect();
        assert_eq!(state.warm_up(&bars), 4);
        assert_eq!(state.previous_bar().map(|b| b.timestamp), Some(2 * 86_400_000));
    }
}
