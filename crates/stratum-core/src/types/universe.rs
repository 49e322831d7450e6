//! Universe selection inputs and membership changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Coarse/fine fundamental snapshot for one symbol on one date.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fundamental {
    pub symbol: String,
    pub market_cap: f64,
    /// Morningstar sector code (e.g. 311 for technology)
    pub sector_code: Option<u32>,
    pub dollar_volume: f64,
    pub price: f64,
    pub has_fundamental_data: bool,
    /// ETFs this symbol is a constituent of
    #[serde(default)]
    pub etfs: Vec<String>,
}

impl Fundamental {
    pub fn is_member_of(&self, etf: &str) -> bool {
        self.etfs.iter().any(|e| e.eq_ignore_ascii_case(etf))
    }
}

/// Symbols entering and leaving the universe on one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SecurityChanges {
    /// Changes that turn `current` into `next`, both in sorted order.
    pub fn between(current: &BTreeSet<String>, next: &BTreeSet<String>) -> Self {
        Self {
            added: next.difference(current).cloned().collect(),
            removed: current.difference(next).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_changes_between_sets() {
        let changes = SecurityChanges::between(&set(&["AAPL", "MSFT"]), &set(&["MSFT", "NVDA"]));
        assert_eq!(changes.added, vec!["NVDA"]);
        assert_eq!(changes.removed, vec!["AAPL"]);

        let same = SecurityChanges::between(&set(&["AAPL"]), &set(&["AAPL"]));
        assert!(same.is_empty());
    }

    #[test]
    fn test_etf_membership_is_case_insensitive() {
        let f = Fundamental {
            symbol: "AAPL".into(),
            etfs: vec!["SPY".into(), "QQQ".into()],
            ..Default::default()
        };
        assert!(f.is_member_of("spy"));
        assert!(!f.is_member_of("IWM"));
    }
}
