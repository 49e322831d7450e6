//! Momentum indicators.

use std::collections::VecDeque;
use stratum_core::traits::{Indicator, StreamingIndicator};

use crate::moving_average::{MovingAverage, MovingAverageKind};

/// Relative Strength Index over close-to-close changes.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev: Option<f64>,
    gains: MovingAverage,
    losses: MovingAverage,
    value: Option<f64>,
}

impl Rsi {
    /// RSI with Wilder's smoothing.
    pub fn new(period: usize) -> Self {
        Self::with_kind(period, MovingAverageKind::Wilders)
    }

    pub fn with_kind(period: usize, kind: MovingAverageKind) -> Self {
        Self {
            period,
            prev: None,
            gains: MovingAverage::new(kind, period),
            losses: MovingAverage::new(kind, period),
            value: None,
        }
    }
}

impl StreamingIndicator for Rsi {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        let prev = self.prev.replace(value)?;
        let change = value - prev;
        let gain = self.gains.update(change.max(0.0));
        let loss = self.losses.update((-change).max(0.0));

        if let (Some(gain), Some(loss)) = (gain, loss) {
            self.value = Some(if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            });
        }
        self.value
    }

    fn current(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        self.prev = None;
        self.gains.reset();
        self.losses.reset();
        self.value = None;
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        let mut fresh = Self::with_kind(self.period, self.gains.kind());
        data.iter().filter_map(|&x| fresh.update(x)).collect()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

/// Rate of change in percent: `(value - value[n]) / value[n] * 100`.
#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    window: VecDeque<f64>,
    value: Option<f64>,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            value: None,
        }
    }
}

impl StreamingIndicator for Roc {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period + 1 {
            self.window.pop_front();
        }
        self.window.push_back(value);

        if self.window.len() == self.period + 1 {
            let base = self.window[0];
            // Undefined on a zero base.
            self.value = (base != 0.0).then(|| (value - base) / base * 100.0);
        }
        self.value
    }

    fn current(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        self.window.clear();
        self.value = None;
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "ROC"
    }
}

impl Indicator for Roc {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        let mut fresh = Self::new(self.period);
        data.iter().filter_map(|&x| fresh.update(x)).collect()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "ROC"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_bounds() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let result = Rsi::new(14).calculate(&data);
        assert_eq!(result.len(), data.len() - 14);
        assert!(result.iter().all(|&v| (0.0..=100.0).contains(&v)));
    }

    #[test]
    fn test_rsi_monotonic_series() {
        let rising: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(Rsi::new(14).calculate(&rising).last(), Some(&100.0));
        assert_eq!(Rsi::new(14).calculate(&falling).last(), Some(&0.0));
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        let mut rsi = Rsi::new(3);
        assert_eq!(rsi.update(10.0), None);
        assert_eq!(rsi.update(11.0), None);
        assert_eq!(rsi.update(10.0), None);
        assert!(rsi.update(12.0).is_some());
    }

    #[test]
    fn test_roc_percent() {
        let mut roc = Roc::new(2);
        assert_eq!(roc.update(100.0), None);
        assert_eq!(roc.update(90.0), None);
        let v = roc.update(80.0).unwrap();
        assert!((v + 20.0).abs() < 1e-9);
        let v = roc.update(99.0).unwrap();
        assert!((v - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_roc_zero_base_is_undefined() {
        let mut roc = Roc::new(1);
        roc.update(10.0);
        assert!(roc.update(0.0).is_some());
        assert_eq!(roc.update(5.0), None);
        assert!(!roc.is_ready());
        assert_eq!(roc.update(10.0), Some(100.0));
    }

    #[test]
    fn test_roc_reset() {
        let mut roc = Roc::new(1);
        roc.update(1.0);
        roc.update(2.0);
        assert!(roc.is_ready());
        roc.reset();
        assert!(!roc.is_ready());
        assert_eq!(Indicator::period(&roc), 2);
    }
}
