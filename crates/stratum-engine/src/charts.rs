//! Indicator series recorded for plotting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// Series keyed by symbol, then by series name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartRecorder {
    series: BTreeMap<String, BTreeMap<String, Vec<ChartPoint>>>,
}

impl ChartRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, symbol: &str, name: &str, timestamp: i64, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.series
            .entry(symbol.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(ChartPoint { timestamp, value });
    }

    pub fn series(&self, symbol: &str, name: &str) -> Option<&[ChartPoint]> {
        self.series
            .get(symbol)
            .and_then(|by_name| by_name.get(name))
            .map(Vec::as_slice)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// `(symbol, series, point)` rows in symbol, series, time order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &ChartPoint)> {
        self.series.iter().flat_map(|(symbol, by_name)| {
            by_name.iter().flat_map(move |(name, points)| {
                points.iter().map(move |p| (symbol.as_str(), name.as_str(), p))
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
