//! Moving averages.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use stratum_core::traits::{Indicator, StreamingIndicator};

/// Smoothing used by moving averages and by the indicators built on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingAverageKind {
    /// Arithmetic mean of the last N values.
    Simple,
    /// Wilder's smoothing: seeded with the simple mean, then
    /// `avg = (prev * (n - 1) + value) / n`.
    #[default]
    Wilders,
}

/// Streaming moving average.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    kind: MovingAverageKind,
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    value: Option<f64>,
}

impl MovingAverage {
    pub fn new(kind: MovingAverageKind, period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self {
            kind,
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            value: None,
        }
    }

    pub fn simple(period: usize) -> Self {
        Self::new(MovingAverageKind::Simple, period)
    }

    pub fn wilders(period: usize) -> Self {
        Self::new(MovingAverageKind::Wilders, period)
    }

    pub fn kind(&self) -> MovingAverageKind {
        self.kind
    }
}

impl StreamingIndicator for MovingAverage {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        let n = self.period as f64;
        match (self.kind, self.value) {
            (MovingAverageKind::Wilders, Some(prev)) => {
                self.value = Some((prev * (n - 1.0) + value) / n);
            }
            _ => {
                if self.window.len() == self.period {
                    if let Some(oldest) = self.window.pop_front() {
                        self.sum -= oldest;
                    }
                }
                self.window.push_back(value);
                self.sum += value;
                if self.window.len() == self.period {
                    self.value = Some(self.sum / n);
                }
            }
        }
        self.value
    }

    fn current(&self) -> Option<f64> {
        self.value
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.value = None;
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        match self.kind {
            MovingAverageKind::Simple => "SMA",
            MovingAverageKind::Wilders => "WILDERS",
        }
    }
}

impl Indicator for MovingAverage {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        let mut fresh = Self::new(self.kind, self.period);
        data.iter().filter_map(|&x| fresh.update(x)).collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        StreamingIndicator::name(self)
    }
}
