//! Portfolio-level entry limits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use stratum_core::types::Portfolio;

/// Result of a limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    Allowed,
    Blocked { reason: String },
    /// Allowed up to `max_value` notional
    Reduced { max_value: Decimal, reason: String },
}

impl LimitCheck {
    pub fn is_allowed(&self) -> bool {
        !self.is_blocked()
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LimitCheck::Blocked { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioLimits {
    /// Open positions plus in-flight entries
    pub max_positions: usize,
    /// Cash that must remain after an entry
    pub min_cash: Decimal,
    /// Largest single entry as percent of equity
    pub max_position_pct: Option<Decimal>,
}

impl Default for PortfolioLimits {
    fn default() -> Self {
        Self {
            max_positions: 10,
            min_cash: Decimal::ZERO,
            max_position_pct: None,
        }
    }
}

impl PortfolioLimits {
    /// Check a new entry of `position_value` notional. `committed` counts open
    /// positions and entries already submitted but not yet filled.
    pub fn check_new_position(
        &self,
        portfolio: &Portfolio,
        committed: usize,
        position_value: Decimal,
    ) -> LimitCheck {
        if committed >= self.max_positions {
            return LimitCheck::Blocked {
                reason: format!(
                    "max positions reached: {} (limit: {})",
                    committed, self.max_positions
                ),
            };
        }

        let spendable = portfolio.cash - self.min_cash;
        if position_value > spendable {
            if spendable <= Decimal::ZERO {
                return LimitCheck::Blocked {
                    reason: format!(
                        "insufficient cash: {:.2} (minimum {:.2})",
                        portfolio.cash, self.min_cash
                    ),
                };
            }
            return LimitCheck::Reduced {
                max_value: spendable,
                reason: "limited by minimum cash".to_string(),
            };
        }

        if let Some(pct) = self.max_position_pct {
            let cap = portfolio.equity * pct / dec!(100);
            if position_value > cap {
                return LimitCheck::Reduced {
                    max_value: cap,
                    reason: format!("limited by max position size ({pct}%)"),
                };
            }
        }

        LimitCheck::Allowed
    }
}
