//! One time step of market data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Bar;

/// All bars that share one timestamp, keyed by symbol in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub bars: BTreeMap<String, Bar>,
}

impl Slice {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            bars: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, symbol: impl Into<String>, bar: Bar) {
        self.bars.insert(symbol.into(), bar);
    }

    pub fn with_bar(mut self, symbol: impl Into<String>, bar: Bar) -> Self {
        self.insert(symbol, bar);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&Bar> {
        self.bars.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.bars.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}
