//! Host callback interface.
//!
//! A host (the replay backtester, or any other driver) owns market data,
//! order execution and the portfolio. It drives an [`Algorithm`] one callback
//! at a time and executes whatever [`EngineAction`]s come back.

use serde::{Deserialize, Serialize};

use crate::types::{
    Bar, ExitReason, Fundamental, OrderEvent, OrderRequest, Portfolio, SecurityChanges, Slice,
};

/// Instruction returned to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineAction {
    /// Submit an order as given.
    Submit(OrderRequest),
    /// Flatten the whole position in `symbol`.
    Liquidate { symbol: String, reason: ExitReason },
}

impl EngineAction {
    pub fn symbol(&self) -> &str {
        match self {
            EngineAction::Submit(request) => &request.symbol,
            EngineAction::Liquidate { symbol, .. } => symbol,
        }
    }
}

/// Callbacks a host invokes, in this order per time step:
/// universe selection, `on_securities_changed`, margin check, `on_data`,
/// then `on_order_event` for every resulting fill or rejection.
pub trait Algorithm: Send {
    fn name(&self) -> &str;

    /// Symbols the host must always feed, whether or not they are in the universe.
    fn subscriptions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Choose the universe from a fundamentals snapshot.
    /// `None` keeps the current universe unchanged.
    fn select_universe(&mut self, _fundamentals: &[Fundamental]) -> Option<Vec<String>> {
        None
    }

    fn on_securities_changed(
        &mut self,
        changes: &SecurityChanges,
        portfolio: &Portfolio,
    ) -> Vec<EngineAction>;

    /// Bars of history the host should replay through [`Algorithm::on_history`]
    /// for each newly added symbol.
    fn history_request(&self) -> usize {
        0
    }

    /// Daily bars preceding the current time for a symbol just added, oldest first.
    fn on_history(&mut self, _symbol: &str, _bars: &[Bar]) {}

    fn on_data(&mut self, slice: &Slice, portfolio: &Portfolio) -> Vec<EngineAction>;

    fn on_order_event(&mut self, _event: &OrderEvent, _portfolio: &Portfolio) -> Vec<EngineAction> {
        Vec::new()
    }

    /// Reorder or trim the host's liquidation orders. The default keeps them.
    fn on_margin_call(
        &mut self,
        requests: Vec<OrderRequest>,
        _portfolio: &Portfolio,
    ) -> Vec<OrderRequest> {
        requests
    }

    fn on_end_of_algorithm(&mut self, _portfolio: &Portfolio) -> Vec<EngineAction> {
        Vec::new()
    }
}
