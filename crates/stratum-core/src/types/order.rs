//! Orders, fills and the events the host reports back to the algorithm.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type. The replay host only executes market orders; limits are
/// filled at the close when the close is marketable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// What the algorithm asks the host to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Unsigned share count
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    /// Free-form label carried through to the order event (exit reason, "entry", ...)
    pub tag: Option<String>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            tag: None,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// A single execution against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: Uuid,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An order as tracked by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub tag: Option<String>,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub fees: Decimal,
    pub fills: Vec<Fill>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Broker's reason when the order was rejected
    pub reject_reason: Option<String>,
}

impl Order {
    /// New order stamped with the host's clock, not the wall clock.
    pub fn from_request(request: &OrderRequest, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            tag: request.tag.clone(),
            status: OrderStatus::Submitted,
            filled_quantity: Decimal::ZERO,
            filled_avg_price: None,
            fees: Decimal::ZERO,
            fills: Vec::new(),
            created_at: at,
            updated_at: at,
            reject_reason: None,
        }
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Notional of the filled part, excluding fees.
    pub fn value(&self) -> Option<Decimal> {
        self.filled_avg_price.map(|p| p * self.filled_quantity)
    }

    pub fn add_fill(&mut self, fill: Fill) {
        let total_qty = self.filled_quantity + fill.quantity;
        let total_value = self.filled_avg_price.unwrap_or(Decimal::ZERO) * self.filled_quantity
            + fill.price * fill.quantity;

        if total_qty > Decimal::ZERO {
            self.filled_avg_price = Some(total_value / total_qty);
        }
        self.filled_quantity = total_qty;
        self.fees += fill.fee;
        self.updated_at = fill.timestamp;
        self.fills.push(fill);

        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    pub fn reject(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = OrderStatus::Rejected;
        self.reject_reason = Some(reason.into());
        self.updated_at = at;
    }
}

/// Status change delivered to `Algorithm::on_order_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub status: OrderStatus,
    /// Price of this fill, zero when nothing filled
    pub fill_price: Decimal,
    pub fill_quantity: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
    pub tag: Option<String>,
    pub message: Option<String>,
}

impl OrderEvent {
    /// Event describing the latest fill (or the rejection) of `order`.
    pub fn from_order(order: &Order) -> Self {
        let last = order.fills.last();
        Self {
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            status: order.status,
            fill_price: last.map(|f| f.price).unwrap_or(Decimal::ZERO),
            fill_quantity: last.map(|f| f.quantity).unwrap_or(Decimal::ZERO),
            fee: last.map(|f| f.fee).unwrap_or(Decimal::ZERO),
            timestamp: order.updated_at,
            tag: order.tag.clone(),
            message: order.reject_reason.clone(),
        }
    }

    /// Rejection for a request the broker never accepted.
    pub fn rejected(request: &OrderRequest, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            order_id: Uuid::nil(),
            symbol: request.symbol.clone(),
            side: request.side,
            status: OrderStatus::Rejected,
            fill_price: Decimal::ZERO,
            fill_quantity: Decimal::ZERO,
            fee: Decimal::ZERO,
            timestamp: at,
            tag: request.tag.clone(),
            message: Some(reason.into()),
        }
    }

    pub fn is_fill(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::PartiallyFilled
        ) && self.fill_quantity > Decimal::ZERO
    }
}
