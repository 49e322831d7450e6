//! Ordering of host-generated margin-call liquidations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stratum_core::types::{OrderRequest, Portfolio};

/// How the engine reorders the host's margin-call orders before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginCallPolicy {
    /// Keep the host's order.
    #[default]
    HostDefault,
    /// Liquidate the most negative unrealized PnL first.
    LargestLossFirst,
    /// Liquidate the largest absolute market value first.
    LargestPositionFirst,
}

impl MarginCallPolicy {
    /// Reorder `requests`. Orders for symbols with no position sort last.
    pub fn apply(&self, mut requests: Vec<OrderRequest>, portfolio: &Portfolio) -> Vec<OrderRequest> {
        match self {
            MarginCallPolicy::HostDefault => {}
            MarginCallPolicy::LargestLossFirst => requests.sort_by_key(|r| {
                portfolio
                    .get_position(&r.symbol)
                    .map(|p| p.unrealized_pnl)
                    .unwrap_or(Decimal::MAX)
            }),
            MarginCallPolicy::LargestPositionFirst => requests.sort_by_key(|r| {
                std::cmp::Reverse(
                    portfolio
                        .get_position(&r.symbol)
                        .map(|p| p.market_value.abs())
                        .unwrap_or(Decimal::MIN),
                )
            }),
        }
        requests
    }
}
