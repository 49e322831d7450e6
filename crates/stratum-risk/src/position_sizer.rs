//! Position sizing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use stratum_core::types::Portfolio;

/// How many shares an entry buys. Percentages are in percent units (10 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PositionSizingMethod {
    /// Fixed share count
    Fixed { shares: Decimal },
    /// Fixed notional
    FixedDollar { amount: Decimal },
    /// Percent of total equity
    PercentEquity { percent: Decimal },
    /// Percent of available cash
    PercentCash { percent: Decimal },
    /// Percent of equity put at risk between entry and stop
    RiskBased { risk_percent: Decimal },
}

impl Default for PositionSizingMethod {
    fn default() -> Self {
        PositionSizingMethod::PercentEquity { percent: dec!(10) }
    }
}

impl PositionSizingMethod {
    pub fn validate(&self) -> Result<(), String> {
        let (value, what) = match self {
            PositionSizingMethod::Fixed { shares } => (*shares, "shares"),
            PositionSizingMethod::FixedDollar { amount } => (*amount, "amount"),
            PositionSizingMethod::PercentEquity { percent }
            | PositionSizingMethod::PercentCash { percent } => (*percent, "percent"),
            PositionSizingMethod::RiskBased { risk_percent } => (*risk_percent, "risk_percent"),
        };
        if value <= Decimal::ZERO {
            return Err(format!("sizing {what} must be positive, got {value}"));
        }
        Ok(())
    }
}

/// Turns a sizing method into whole-share quantities.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    method: PositionSizingMethod,
    max_shares: Option<Decimal>,
    max_position_value: Option<Decimal>,
}

impl PositionSizer {
    pub fn new(method: PositionSizingMethod) -> Self {
        Self {
            method,
            max_shares: None,
            max_position_value: None,
        }
    }

    pub fn with_max_shares(mut self, max: Decimal) -> Self {
        self.max_shares = Some(max);
        self
    }

    pub fn with_max_position_value(mut self, max: Decimal) -> Self {
        self.max_position_value = Some(max);
        self
    }

    pub fn method(&self) -> &PositionSizingMethod {
        &self.method
    }

    /// Whole shares to buy at `price`, capped by buying power. Zero when the
    /// price is not positive or the allocation buys less than one share.
    pub fn calculate(
        &self,
        portfolio: &Portfolio,
        price: Decimal,
        stop_price: Option<Decimal>,
    ) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let pct = |p: Decimal| p / dec!(100);
        let raw = match &self.method {
            PositionSizingMethod::Fixed { shares } => *shares,
            PositionSizingMethod::FixedDollar { amount } => *amount / price,
            PositionSizingMethod::PercentEquity { percent } => {
                portfolio.equity * pct(*percent) / price
            }
            PositionSizingMethod::PercentCash { percent } => portfolio.cash * pct(*percent) / price,
            PositionSizingMethod::RiskBased { risk_percent } => {
                let budget = portfolio.equity * pct(*risk_percent);
                match stop_price.map(|s| price - s) {
                    Some(per_share) if per_share > Decimal::ZERO => budget / per_share,
                    // Without a usable stop, treat the budget as a notional.
                    _ => budget / price,
                }
            }
        };

        let mut size = raw;
        if let Some(max) = self.max_shares {
            size = size.min(max);
        }
        if let Some(max_value) = self.max_position_value {
            size = size.min(max_value / price);
        }
        size = size.min(portfolio.buying_power.max(Decimal::ZERO) / price);

        size.floor().max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portfolio(equity: Decimal, cash: Decimal) -> Portfolio {
        let mut portfolio = Portfolio::new(equity);
        portfolio.cash = cash;
        portfolio.buying_power = cash;
        portfolio
    }

    #[test]
    fn test_percent_equity() {
        let sizer = PositionSizer::new(PositionSizingMethod::PercentEquity { percent: dec!(5) });
        // 5% of 100k at $100
        assert_eq!(sizer.calculate(&portfolio(dec!(100000), dec!(100000)), dec!(100), None), dec!(50));
    }

    #[test]
    fn test_percent_cash_floors() {
        let sizer = PositionSizer::new(PositionSizingMethod::PercentCash { percent: dec!(10) });
        // 10% of 25k = 2.5k at $33 -> 75.75 shares
        assert_eq!(sizer.calculate(&portfolio(dec!(50000), dec!(25000)), dec!(33), None), dec!(75));
    }

    #[test]
    fn test_risk_based_uses_stop_distance() {
        let sizer = PositionSizer::new(PositionSizingMethod::RiskBased { risk_percent: dec!(1) });
        // 1% of 100k = 1000 at risk, $5 per share
        let size = sizer.calculate(&portfolio(dec!(100000), dec!(100000)), dec!(100), Some(dec!(95)));
        assert_eq!(size, dec!(200));
    }

    #[test]
    fn test_capped_by_buying_power_and_limits() {
        let sizer = PositionSizer::new(PositionSizingMethod::Fixed { shares: dec!(1000) })
            .with_max_shares(dec!(500));
        assert_eq!(sizer.calculate(&portfolio(dec!(100000), dec!(100000)), dec!(10), None), dec!(500));
        assert_eq!(sizer.calculate(&portfolio(dec!(100000), dec!(2000)), dec!(10), None), dec!(200));

        let sizer = sizer.with_max_position_value(dec!(1234));
        assert_eq!(sizer.calculate(&portfolio(dec!(100000), dec!(100000)), dec!(10), None), dec!(123));
    }

    #[test]
    fn test_zero_price_or_tiny_allocation() {
        let sizer = PositionSizer::new(PositionSizingMethod::FixedDollar { amount: dec!(50) });
        assert_eq!(sizer.calculate(&portfolio(dec!(1000), dec!(1000)), Decimal::ZERO, None), Decimal::ZERO);
        assert_eq!(sizer.calculate(&portfolio(dec!(1000), dec!(1000)), dec!(75), None), Decimal::ZERO);
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        assert!(PositionSizingMethod::PercentCash { percent: dec!(0) }.validate().is_err());
        assert!(PositionSizingMethod::default().validate().is_ok());
    }
}
