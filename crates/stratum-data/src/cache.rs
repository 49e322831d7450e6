//! In-memory bar cache.

use std::collections::HashMap;
use std::sync::Arc;
use stratum_core::types::Bar;

/// Loaded bar series keyed by symbol, shared without copying.
#[derive(Debug, Default)]
pub struct DataCache {
    cache: HashMap<String, Arc<Vec<Bar>>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Arc<Vec<Bar>>> {
        self.cache.get(symbol).cloned()
    }

    pub fn put(&mut self, symbol: &str, bars: Vec<Bar>) -> Arc<Vec<Bar>> {
        let bars = Arc::new(bars);
        self.cache.insert(symbol.to_string(), Arc::clone(&bars));
        bars
    }

    pub fn clear(&mut self, symbol: &str) {
        self.cache.remove(symbol);
    }

    pub fn clear_all(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_clear() {
        let mut cache = DataCache::new();
        cache.put("SPY", vec![Bar::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)]);
        assert_eq!(cache.get("SPY").map(|b| b.len()), Some(1));
        assert!(cache.get("QQQ").is_none());

        cache.clear("SPY");
        assert!(cache.is_empty());
    }
}
