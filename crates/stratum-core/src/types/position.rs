//! Positions and the account-level portfolio view.

use num_traits::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{Order, Side};

/// Holding in one security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed share count (negative when short)
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: Decimal, avg_entry_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price,
            current_price: avg_entry_price,
            market_value: quantity * avg_entry_price,
            cost_basis: quantity * avg_entry_price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity.is_positive()
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Unrealized return on cost, in percent.
    pub fn unrealized_pnl_percent(&self) -> Decimal {
        if self.cost_basis.is_zero() {
            return Decimal::ZERO;
        }
        self.unrealized_pnl / self.cost_basis.abs() * Decimal::ONE_HUNDRED
    }

    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = price;
        self.market_value = self.quantity * price;
        self.unrealized_pnl = self.market_value - self.cost_basis;
    }

    /// Apply an execution; returns the PnL realized by any reduction.
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let delta = side.sign() * quantity;
        let mut realized = Decimal::ZERO;

        if self.quantity.is_zero() || self.quantity.signum() == delta.signum() {
            let new_qty = self.quantity + delta;
            if !new_qty.is_zero() {
                self.avg_entry_price =
                    (self.quantity * self.avg_entry_price + delta * price) / new_qty;
            }
            self.quantity = new_qty;
        } else {
            let closed = delta.abs().min(self.quantity.abs());
            realized = closed * (price - self.avg_entry_price) * self.quantity.signum();
            self.realized_pnl += realized;

            let flipped = delta.abs() - closed;
            if flipped.is_positive() {
                self.quantity = delta.signum() * flipped;
                self.avg_entry_price = price;
            } else {
                self.quantity += delta;
            }
        }

        self.cost_basis = self.quantity * self.avg_entry_price;
        self.update_price(price);
        realized
    }
}

/// Cash plus positions, as the host reports them to the algorithm.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    /// Cash available for new longs after margin
    pub buying_power: Decimal,
    pub equity: Decimal,
    pub positions: BTreeMap<String, Position>,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_fees: Decimal,
    pub initial_capital: Decimal,
    pub peak_equity: Decimal,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            buying_power: initial_capital,
            equity: initial_capital,
            initial_capital,
            peak_equity: initial_capital,
            ..Default::default()
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// True when a non-flat position exists.
    pub fn is_invested(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| !p.is_flat())
    }

    /// Signed quantity held, zero when flat.
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn invested_count(&self) -> usize {
        self.positions.values().filter(|p| !p.is_flat()).count()
    }

    /// Sum of absolute market values.
    pub fn gross_exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value.abs()).sum()
    }

    pub fn update_equity(&mut self) {
        let market_value: Decimal = self.positions.values().map(|p| p.market_value).sum();
        self.equity = self.cash + market_value;
        self.total_unrealized_pnl = self.positions.values().map(|p| p.unrealized_pnl).sum();
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
    }

    /// Book a filled (or partially filled) order, fees included.
    pub fn apply_order(&mut self, order: &Order) {
        let Some(price) = order.filled_avg_price else {
            return;
        };
        if order.filled_quantity.is_zero() {
            return;
        }

        self.cash -= order.side.sign() * price * order.filled_quantity;
        self.cash -= order.fees;
        self.total_fees += order.fees;

        let position = self
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::new(&order.symbol, Decimal::ZERO, Decimal::ZERO));
        self.total_realized_pnl += position.apply_fill(order.side, order.filled_quantity, price);

        if position.is_flat() {
            self.positions.remove(&order.symbol);
        }
        self.update_equity();
    }

    pub fn update_prices(&mut self, prices: &HashMap<String, Decimal>) {
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                position.update_price(price);
            }
        }
        self.update_equity();
    }

    /// Drawdown from peak equity, in percent.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity.is_zero() {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity * Decimal::ONE_HUNDRED
    }

    /// Return on initial capital, in percent.
    pub fn total_return(&self) -> Decimal {
        if self.initial_capital.is_zero() {
            return Decimal::ZERO;
        }
        (self.equity - self.initial_capital) / self.initial_capital * Decimal::ONE_HUNDRED
    }
}
