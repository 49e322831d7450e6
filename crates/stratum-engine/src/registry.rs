//! Arena of instrument states addressed by generational ids.
//!
//! Slots are reused after removal; the generation stops a stale id from
//! reaching the instrument that took its slot.

use std::collections::BTreeMap;
use stratum_core::error::EngineError;

use crate::instrument::InstrumentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    state: Option<InstrumentState>,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    index: BTreeMap<String, InstrumentId>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, state: InstrumentState) -> Result<InstrumentId, EngineError> {
        let symbol = state.symbol().to_string();
        if self.index.contains_key(&symbol) {
            return Err(EngineError::DuplicateInstrument(symbol));
        }

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.state = Some(state);
                InstrumentId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: Some(state),
                });
                InstrumentId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.index.insert(symbol, id);
        Ok(id)
    }

    /// Remove and return the state for `symbol`.
    pub fn remove(&mut self, symbol: &str) -> Result<InstrumentState, EngineError> {
        let id = self
            .index
            .remove(symbol)
            .ok_or_else(|| EngineError::UnknownInstrument(symbol.to_string()))?;
        let slot = &mut self.slots[id.index];
        let state = slot
            .state
            .take()
            .ok_or_else(|| EngineError::UnknownInstrument(symbol.to_string()))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(state)
    }

    pub fn id(&self, symbol: &str) -> Option<InstrumentId> {
        self.index.get(symbol).copied()
    }

    pub fn get(&self, id: InstrumentId) -> Option<&InstrumentState> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_ref())
    }

    pub fn get_mut(&mut self, id: InstrumentId) -> Option<&mut InstrumentState> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_mut())
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&InstrumentState> {
        self.id(symbol).and_then(|id| self.get(id))
    }

    pub fn by_symbol_mut(&mut self, symbol: &str) -> Option<&mut InstrumentState> {
        let id = self.id(symbol)?;
        self.get_mut(id)
    }

    /// Ids in symbol order.
    pub fn ids(&self) -> Vec<InstrumentId> {
        self.index.values().copied().collect()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentState> {
        self.index.values().filter_map(|id| self.get(*id))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::IndicatorSettings;

    fn state(symbol: &str) -> InstrumentState {
        InstrumentState::new(symbol, &IndicatorSettings::default())
    }

    #[test]
    fn test_add_and_lookup() {
        let mut registry = InstrumentRegistry::new();
        let id = registry.add(state("MSFT")).unwrap();
        registry.add(state("AAPL")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(id).map(|s| s.symbol()), Some("MSFT"));
        assert_eq!(registry.symbols().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = InstrumentRegistry::new();
        registry.add(state("MSFT")).unwrap();
        assert_eq!(
            registry.add(state("MSFT")),
            Err(EngineError::DuplicateInstrument("MSFT".into()))
        );
    }

    #[test]
    fn test_remove_unknown() {
        let mut registry = InstrumentRegistry::new();
        assert!(matches!(
            registry.remove("NOPE"),
            Err(EngineError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_stale_id_after_slot_reuse() {
        let mut registry = InstrumentRegistry::new();
        let old = registry.add(state("OLD")).unwrap();
        registry.remove("OLD").unwrap();
        let new = registry.add(state("NEW")).unwrap();

        assert_ne!(old, new);
        assert!(registry.get(old).is_none());
        assert_eq!(registry.get(new).map(|s| s.symbol()), Some("NEW"));
        assert!(!registry.contains("OLD"));
    }
}
