//! Transaction cost models.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use stratum_core::types::Side;

/// `fee = fixed + pct% of order value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    pub fixed: Decimal,
    /// Percent of order value (0.1 = 0.1%)
    pub pct: Decimal,
}

impl FeeModel {
    pub fn new(fixed: Decimal, pct: Decimal) -> Self {
        Self { fixed, pct }
    }

    pub fn free() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    pub fn fee(&self, order_value: Decimal) -> Decimal {
        self.fixed + order_value.abs() * self.pct / dec!(100)
    }
}

impl Default for FeeModel {
    fn default() -> Self {
        Self::new(dec!(1), dec!(0.1))
    }
}

/// Moves the fill price against the taker by a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageModel {
    /// Percent of price (0.05 = 0.05%)
    pub pct: Decimal,
}

impl SlippageModel {
    pub fn new(pct: Decimal) -> Self {
        Self { pct }
    }

    pub fn none() -> Self {
        Self::new(Decimal::ZERO)
    }

    pub fn fill_price(&self, side: Side, price: Decimal) -> Decimal {
        price + side.sign() * price * self.pct / dec!(100)
    }
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::new(dec!(0.05))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_plus_percent_fee() {
        let fees = FeeModel::default();
        // $1 + 0.1% of 10,000
        assert_eq!(fees.fee(dec!(10000)), dec!(11));
        assert_eq!(FeeModel::free().fee(dec!(10000)), Decimal::ZERO);
    }

    #[test]
    fn test_slippage_against_taker() {
        let slippage = SlippageModel::default();
        assert_eq!(slippage.fill_price(Side::Buy, dec!(100)), dec!(100.05));
        assert_eq!(slippage.fill_price(Side::Sell, dec!(100)), dec!(99.95));
    }
}
