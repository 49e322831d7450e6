//! ATR stop/target brackets with holding limits.
//!
//! A bracket is opened from the entry fill price and the ATR at that moment:
//! `stop = fill - k1 * ATR`, `target = fill + k2 * ATR`. It is checked once per
//! bar, stop first, then target, then the holding limits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_core::error::EngineError;
use stratum_core::types::ExitReason;

/// Bracket parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketConfig {
    /// k1: stop distance in ATRs below the fill
    pub stop_atr_multiple: Decimal,
    /// k2: target distance in ATRs above the fill
    pub target_atr_multiple: Decimal,
    /// Exit once more than this many calendar days have passed since entry
    #[serde(default)]
    pub max_holding_days: Option<i64>,
    /// Exit once the position has been held for this many bars
    #[serde(default)]
    pub max_holding_bars: Option<usize>,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            stop_atr_multiple: dec!(2.5),
            target_atr_multiple: dec!(1),
            max_holding_days: Some(15),
            max_holding_bars: None,
        }
    }
}

impl BracketConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.stop_atr_multiple <= Decimal::ZERO {
            return Err("stop_atr_multiple must be positive".into());
        }
        if self.target_atr_multiple <= Decimal::ZERO {
            return Err("target_atr_multiple must be positive".into());
        }
        if matches!(self.max_holding_days, Some(d) if d < 0) {
            return Err("max_holding_days must not be negative".into());
        }
        if self.max_holding_bars == Some(0) {
            return Err("max_holding_bars must be at least 1".into());
        }
        Ok(())
    }
}

/// Stop, target and holding clock for one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub entry_time: DateTime<Utc>,
    /// Bars seen since the entry fill
    pub bars_held: usize,
    max_holding_days: Option<i64>,
    max_holding_bars: Option<usize>,
}

impl Bracket {
    /// Build a bracket from the entry fill. Fails when ATR is not positive.
    pub fn from_fill(
        symbol: impl Into<String>,
        quantity: Decimal,
        fill_price: Decimal,
        atr: Decimal,
        config: &BracketConfig,
        entry_time: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let symbol = symbol.into();
        if atr <= Decimal::ZERO {
            return Err(EngineError::BracketUnavailable {
                symbol,
                reason: format!("ATR must be positive, got {atr}"),
            });
        }
        Ok(Self {
            quantity,
            entry_price: fill_price,
            stop_price: fill_price - config.stop_atr_multiple * atr,
            target_price: fill_price + config.target_atr_multiple * atr,
            entry_time,
            bars_held: 0,
            max_holding_days: config.max_holding_days,
            max_holding_bars: config.max_holding_bars,
            symbol,
        })
    }

    /// Whole calendar days between entry and `now`.
    pub fn holding_days(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.entry_time.date_naive()).num_days()
    }

    /// Count one more bar held.
    pub fn advance(&mut self) {
        self.bars_held += 1;
    }

    /// First exit condition met at `price`, in priority order.
    pub fn check(&self, price: Decimal, now: DateTime<Utc>) -> Option<ExitReason> {
        if price <= self.stop_price {
            Some(ExitReason::StopLoss)
        } else if price >= self.target_price {
            Some(ExitReason::TakeProfit)
        } else if self
            .max_holding_days
            .is_some_and(|max| self.holding_days(now) > max)
            || self
                .max_holding_bars
                .is_some_and(|max| self.bars_held >= max)
        {
            Some(ExitReason::MaxHoldingPeriod)
        } else {
            None
        }
    }
}

/// All open brackets, at most one per symbol.
#[derive(Debug, Clone, Default)]
pub struct BracketBook {
    brackets: BTreeMap<String, Bracket>,
}

impl BracketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, bracket: Bracket) -> Result<&Bracket, EngineError> {
        if self.brackets.contains_key(&bracket.symbol) {
            return Err(EngineError::BracketAlreadyOpen(bracket.symbol));
        }
        let symbol = bracket.symbol.clone();
        Ok(self.brackets.entry(symbol).or_insert(bracket))
    }

    pub fn get(&self, symbol: &str) -> Option<&Bracket> {
        self.brackets.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut Bracket> {
        self.brackets.get_mut(symbol)
    }

    pub fn close(&mut self, symbol: &str) -> Option<Bracket> {
        self.brackets.remove(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.brackets.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bracket> {
        self.brackets.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.brackets.keys().cloned().collect()
    }

    /// Drop brackets whose symbols fail `keep`; returns the dropped ones.
    pub fn retain(&mut self, mut keep: impl FnMut(&Bracket) -> bool) -> Vec<Bracket> {
        let dropped: Vec<String> = self
            .brackets
            .values()
            .filter(|b| !keep(b))
            .map(|b| b.symbol.clone())
            .collect();
        dropped
            .into_iter()
            .filter_map(|s| self.brackets.remove(&s))
            .collect()
    }
}
