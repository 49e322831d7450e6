//! Daily OHLCV bars and bounded bar history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One OHLCV bar. Prices are `f64` so indicators stay cheap.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close minus previous close, as a fraction of the previous close.
    #[inline]
    pub fn change_from(&self, prev_close: f64) -> Option<f64> {
        (prev_close != 0.0).then(|| (self.close - prev_close) / prev_close)
    }

    /// Bar's traded notional (close times volume).
    #[inline]
    pub fn dollar_volume(&self) -> f64 {
        self.close * self.volume
    }

    /// Timestamp as a UTC datetime. Out-of-range timestamps collapse to the epoch.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// Calendar date of the bar in UTC.
    pub fn date(&self) -> NaiveDate {
        self.datetime().date_naive()
    }

    /// True range against the previous close (plain range on the first bar).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        let range = self.high - self.low;
        match prev_close {
            Some(pc) => range.max((self.high - pc).abs()).max((self.low - pc).abs()),
            None => range,
        }
    }
}

/// Bounded, oldest-first bar history for a single instrument.
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub symbol: String,
    bars: VecDeque<Bar>,
    /// 0 means unbounded
    capacity: usize,
}

impl BarSeries {
    /// Unbounded series.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_capacity(symbol, 0)
    }

    /// Series that evicts its oldest bar once `capacity` bars are held.
    pub fn with_capacity(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        if self.capacity > 0 && self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent bar.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Bar before the most recent one.
    pub fn previous(&self) -> Option<&Bar> {
        self.bars.len().checked_sub(2).and_then(|i| self.bars.get(i))
    }

    /// Bar by position, 0 being the oldest held.
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }
}

impl FromIterator<Bar> for BarSeries {
    fn from_iter<T: IntoIterator<Item = Bar>>(iter: T) -> Self {
        Self {
            symbol: String::new(),
            bars: iter.into_iter().collect(),
            capacity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_range_uses_gap() {
        let bar = Bar::new(0, 100.0, 110.0, 95.0, 105.0, 1_000.0);
        assert!((bar.true_range(None) - 15.0).abs() < 1e-9);
        assert!((bar.true_range(Some(90.0)) - 20.0).abs() < 1e-9);
        assert!((bar.true_range(Some(120.0)) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_change_from_previous_close() {
        let bar = Bar::new(0, 80.0, 81.0, 79.0, 80.0, 1.0);
        assert!((bar.change_from(100.0).unwrap() + 0.2).abs() < 1e-12);
        assert!(bar.change_from(0.0).is_none());
    }

    #[test]
    fn test_series_never_exceeds_capacity() {
        let mut series = BarSeries::with_capacity("AAPL", 3);
        for i in 0..10 {
            series.push(Bar::new(i, 1.0, 1.0, 1.0, i as f64, 1.0));
            assert!(series.len() <= 3);
        }
        assert_eq!(series.get(0).unwrap().timestamp, 7);
        assert_eq!(series.last().unwrap().timestamp, 9);
        assert_eq!(series.previous().unwrap().timestamp, 8);
    }

    #[test]
    fn test_previous_needs_two_bars() {
        let mut series = BarSeries::new("MSFT");
        assert!(series.previous().is_none());
        series.push(Bar::default());
        assert!(series.previous().is_none());
        series.push(Bar::default());
        assert!(series.previous().is_some());
    }

    #[test]
    fn test_bar_date() {
        // 2024-03-01T00:00:00Z
        let bar = Bar::new(1_709_251_200_000, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(bar.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
