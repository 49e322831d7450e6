//! Volatility indicators.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use stratum_core::traits::{BarIndicator, Indicator, StreamingIndicator};
use stratum_core::types::Bar;

use crate::moving_average::{MovingAverage, MovingAverageKind};

/// Average True Range.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    average: MovingAverage,
}

impl Atr {
    /// ATR with Wilder's smoothing.
    pub fn new(period: usize) -> Self {
        Self::with_kind(period, MovingAverageKind::Wilders)
    }

    pub fn with_kind(period: usize, kind: MovingAverageKind) -> Self {
        Self {
            period,
            prev_close: None,
            average: MovingAverage::new(kind, period),
        }
    }

    /// ATR series over a bar slice.
    pub fn calculate_bars(&self, bars: &[Bar]) -> Vec<f64> {
        let mut fresh = Self::with_kind(self.period, self.average.kind());
        bars.iter().filter_map(|b| fresh.update_bar(b)).collect()
    }
}

impl BarIndicator for Atr {
    type Output = f64;

    fn update_bar(&mut self, bar: &Bar) -> Option<f64> {
        let tr = bar.true_range(self.prev_close);
        self.prev_close = Some(bar.close);
        self.average.update(tr)
    }

    fn current(&self) -> Option<f64> {
        self.average.current()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.average.reset();
    }

    fn is_ready(&self) -> bool {
        self.average.is_ready()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "ATR"
    }
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Band width as a percent of the middle band: `(upper - lower) / middle * 100`
    pub bandwidth: f64,
    /// Position of the price within the bands (0 = lower, 1 = upper)
    pub percent_b: f64,
}

/// Bollinger Bands over a simple mean and population standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
    window: VecDeque<f64>,
    value: Option<BollingerOutput>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        assert!(
            std_dev_multiplier > 0.0,
            "Standard deviation multiplier must be positive"
        );
        Self {
            period,
            std_dev_multiplier,
            window: VecDeque::with_capacity(period),
            value: None,
        }
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl StreamingIndicator for BollingerBands {
    type Output = BollingerOutput;

    fn update(&mut self, value: f64) -> Option<BollingerOutput> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value);
        if self.window.len() < self.period {
            return None;
        }

        let n = self.period as f64;
        let middle = self.window.iter().sum::<f64>() / n;
        let variance = self.window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / n;
        let offset = self.std_dev_multiplier * variance.sqrt();
        let upper = middle + offset;
        let lower = middle - offset;

        let bandwidth = if middle != 0.0 {
            (upper - lower) / middle * 100.0
        } else {
            0.0
        };
        let percent_b = if upper > lower {
            (value - lower) / (upper - lower)
        } else {
            0.5
        };

        self.value = Some(BollingerOutput {
            upper,
            middle,
            lower,
            bandwidth,
            percent_b,
        });
        self.value
    }

    fn current(&self) -> Option<BollingerOutput> {
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
        self.period
    }

    fn name(&self) -> &str {
        "BB"
    }
}

impl Indicator for BollingerBands {
    type Output = BollingerOutput;

    fn calculate(&self, data: &[f64]) -> Vec<BollingerOutput> {
        let mut fresh = Self::new(self.period, self.std_dev_multiplier);
        data.iter().filter_map(|&x| fresh.update(x)).collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "BB"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar::new(0, close, high, low, close, 1_000.0)
    }

    #[test]
    fn test_atr_simple_average_of_true_ranges() {
        let bars = [bar(11.0, 9.0, 10.0), bar(12.0, 10.0, 11.0), bar(14.0, 11.0, 13.0)];
        // TR: 2, 2, 3
        let result = Atr::with_kind(3, MovingAverageKind::Simple).calculate_bars(&bars);
        assert_eq!(result.len(), 1);
        assert!((result[0] - 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_atr_gap_counts() {
        let mut atr = Atr::with_kind(1, MovingAverageKind::Simple);
        atr.update_bar(&bar(101.0, 99.0, 100.0));
        // Gap down: |low - prev_close| = 12 beats the 2-point range.
        let v = atr.update_bar(&bar(90.0, 88.0, 89.0)).unwrap();
        assert!((v - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_atr_wilders_ready_after_period() {
        let mut atr = Atr::new(14);
        for i in 0..13 {
            assert!(atr.update_bar(&bar(101.0 + i as f64, 99.0, 100.0)).is_none());
        }
        assert!(atr.update_bar(&bar(101.0, 99.0, 100.0)).is_some());
        assert!(atr.is_ready());
    }

    #[test]
    fn test_bollinger_flat_series_has_zero_width() {
        let result = BollingerBands::new(5, 2.0).calculate(&[50.0; 8]);
        assert_eq!(result.len(), 4);
        let last = result[3];
        assert_eq!(last.upper, 50.0);
        assert_eq!(last.lower, 50.0);
        assert_eq!(last.bandwidth, 0.0);
        assert_eq!(last.percent_b, 0.5);
    }

    #[test]
    fn test_bollinger_population_std_dev() {
        // mean 5, population std dev 2
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = BollingerBands::new(8, 2.0).calculate(&data)[0];
        assert!((out.middle - 5.0).abs() < 1e-12);
        assert!((out.upper - 9.0).abs() < 1e-12);
        assert!((out.lower - 1.0).abs() < 1e-12);
        assert!((out.bandwidth - 160.0).abs() < 1e-9);
        assert!((out.percent_b - 1.0).abs() < 1e-12);
    }
}
