//! Entry sizing combined with portfolio limits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stratum_core::types::{OrderRequest, Portfolio, Side};
use tracing::debug;

use crate::{LimitCheck, PortfolioLimits, PositionSizer, PositionSizingMethod};

/// Risk configuration for entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub sizing: PositionSizingMethod,
    #[serde(default)]
    pub limits: PortfolioLimits,
    /// Upper bound on shares per entry
    #[serde(default)]
    pub max_shares: Option<Decimal>,
}

/// Outcome of sizing an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Approved { order: OrderRequest },
    /// Approved with a smaller size than the sizing method asked for
    Modified { order: OrderRequest, reason: String },
    Rejected { reason: String },
}

impl RiskDecision {
    pub fn is_approved(&self) -> bool {
        !matches!(self, RiskDecision::Rejected { .. })
    }

    pub fn order(&self) -> Option<&OrderRequest> {
        match self {
            RiskDecision::Approved { order } | RiskDecision::Modified { order, .. } => Some(order),
            RiskDecision::Rejected { .. } => None,
        }
    }

    pub fn into_order(self) -> Result<OrderRequest, String> {
        match self {
            RiskDecision::Approved { order } | RiskDecision::Modified { order, .. } => Ok(order),
            RiskDecision::Rejected { reason } => Err(reason),
        }
    }
}

/// Sizes long entries and applies portfolio limits.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    sizer: PositionSizer,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        let mut sizer = PositionSizer::new(config.sizing.clone());
        if let Some(max) = config.max_shares {
            sizer = sizer.with_max_shares(max);
        }
        Self { config, sizer }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Build the market buy for a confirmed entry at `price`.
    ///
    /// `stop_hint` is the stop the bracket would get at this price, used by
    /// risk-based sizing. `committed` counts open positions plus pending entries.
    pub fn size_entry(
        &self,
        portfolio: &Portfolio,
        symbol: &str,
        price: Decimal,
        stop_hint: Option<Decimal>,
        committed: usize,
    ) -> RiskDecision {
        if price <= Decimal::ZERO {
            return RiskDecision::Rejected {
                reason: format!("price must be positive, got {price}"),
            };
        }

        let quantity = self.sizer.calculate(portfolio, price, stop_hint);
        if quantity <= Decimal::ZERO {
            return RiskDecision::Rejected {
                reason: format!("sized to zero shares at {price}"),
            };
        }

        match self
            .config
            .limits
            .check_new_position(portfolio, committed, quantity * price)
        {
            LimitCheck::Blocked { reason } => RiskDecision::Rejected { reason },
            LimitCheck::Reduced { max_value, reason } => {
                let reduced = (max_value / price).floor();
                if reduced <= Decimal::ZERO {
                    return RiskDecision::Rejected {
                        reason: format!("too small after reduction: {reason}"),
                    };
                }
                debug!(symbol, %quantity, %reduced, %reason, "entry size reduced");
                RiskDecision::Modified {
                    order: OrderRequest::market(symbol, Side::Buy, reduced).with_tag("entry"),
                    reason,
                }
            }
            LimitCheck::Allowed => RiskDecision::Approved {
                order: OrderRequest::market(symbol, Side::Buy, quantity).with_tag("entry"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn portfolio() -> Portfolio {
        Portfolio::new(dec!(100000))
    }

    fn manager(sizing: PositionSizingMethod, limits: PortfolioLimits) -> RiskManager {
        RiskManager::new(RiskConfig {
            sizing,
            limits,
            max_shares: None,
        })
    }

    #[test]
    fn test_approved_entry_is_tagged_market_buy() {
        let manager = RiskManager::new(RiskConfig::default());
        let decision = manager.size_entry(&portfolio(), "AAPL", dec!(100), None, 0);
        let order = decision.order().unwrap();
        assert_eq!(order.side, Side::Buy);
        // default 10% of equity
        assert_eq!(order.quantity, dec!(100));
        assert_eq!(order.tag.as_deref(), Some("entry"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let manager = manager(
            PositionSizingMethod::FixedDollar { amount: dec!(10) },
            PortfolioLimits::default(),
        );
        let decision = manager.size_entry(&portfolio(), "BRK.A", dec!(600000), None, 0);
        assert!(!decision.is_approved());
        assert!(manager.size_entry(&portfolio(), "X", Decimal::ZERO, None, 0).into_order().is_err());
    }

    #[test]
    fn test_max_positions_blocks() {
        let manager = manager(
            PositionSizingMethod::default(),
            PortfolioLimits {
                max_positions: 1,
                ..Default::default()
            },
        );
        assert!(!manager.size_entry(&portfolio(), "AAPL", dec!(10), None, 1).is_approved());
    }

    #[test]
    fn test_reduced_by_min_cash() {
        let manager = manager(
            PositionSizingMethod::PercentEquity { percent: dec!(100) },
            PortfolioLimits {
                min_cash: dec!(50000),
                ..Default::default()
            },
        );
        match manager.size_entry(&portfolio(), "AAPL", dec!(100), None, 0) {
            RiskDecision::Modified { order, .. } => assert_eq!(order.quantity, dec!(500)),
            other => panic!("expected Modified, got {other:?}"),
        }
    }
}
