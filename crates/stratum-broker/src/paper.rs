//! Simulated broker for backtesting.
//!
//! Orders are accepted by `submit_order` and filled by the host through
//! [`PaperBroker::execute`] at the last price it was given. Time comes from the
//! host's clock so fills carry replay timestamps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stratum_core::error::BrokerError;
use stratum_core::traits::Broker;
use stratum_core::types::{
    Fill, Order, OrderRequest, OrderType, Portfolio, Position, Side,
};
use tracing::debug;
use uuid::Uuid;

use crate::fees::{FeeModel, SlippageModel};

/// Paper broker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperBrokerConfig {
    pub initial_capital: Decimal,
    pub fees: FeeModel,
    pub slippage: SlippageModel,
    /// Buying power is `equity * leverage - gross exposure`
    pub leverage: Decimal,
    /// Margin call when equity falls below this fraction of gross exposure
    pub maintenance_margin: Decimal,
}

impl Default for PaperBrokerConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            fees: FeeModel::default(),
            slippage: SlippageModel::default(),
            leverage: Decimal::ONE,
            maintenance_margin: dec!(0.25),
        }
    }
}

#[derive(Debug)]
struct Market {
    prices: HashMap<String, Decimal>,
    clock: DateTime<Utc>,
}

/// Simulated broker. Orders are executed only when the host calls
/// [`PaperBroker::execute`].
pub struct PaperBroker {
    config: PaperBrokerConfig,
    portfolio: Arc<Mutex<Portfolio>>,
    orders: Arc<Mutex<HashMap<Uuid, Order>>>,
    market: Arc<Mutex<Market>>,
}

/// A poisoned lock only means another caller panicked mid-update; the data
/// is still the last consistent snapshot we wrote.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PaperBroker {
    pub fn new(config: PaperBrokerConfig) -> Self {
        let mut portfolio = Portfolio::new(config.initial_capital);
        portfolio.buying_power = config.initial_capital * config.leverage;
        Self {
            portfolio: Arc::new(Mutex::new(portfolio)),
            orders: Arc::new(Mutex::new(HashMap::new())),
            market: Arc::new(Mutex::new(Market {
                prices: HashMap::new(),
                clock: DateTime::<Utc>::default(),
            })),
            config,
        }
    }

    /// Frictionless broker with the given capital.
    pub fn with_capital(initial_capital: Decimal) -> Self {
        Self::new(PaperBrokerConfig {
            initial_capital,
            fees: FeeModel::free(),
            slippage: SlippageModel::none(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &PaperBrokerConfig {
        &self.config
    }

    pub fn set_time(&self, at: DateTime<Utc>) {
        lock(&self.market).clock = at;
    }

    pub fn now(&self) -> DateTime<Utc> {
        lock(&self.market).clock
    }

    /// Record the latest prices and mark positions to them.
    pub fn update_prices(&self, prices: &HashMap<String, Decimal>) {
        lock(&self.market)
            .prices
            .extend(prices.iter().map(|(s, p)| (s.clone(), *p)));
        let mut portfolio = lock(&self.portfolio);
        portfolio.update_prices(prices);
        self.refresh_buying_power(&mut portfolio);
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        lock(&self.market).prices.get(symbol).copied()
    }

    fn refresh_buying_power(&self, portfolio: &mut Portfolio) {
        portfolio.buying_power =
            (portfolio.equity * self.config.leverage - portfolio.gross_exposure()).max(Decimal::ZERO);
    }

    /// Fill an open order at the last recorded price for its symbol.
    pub fn execute(&self, order_id: Uuid) -> Result<Order, BrokerError> {
        let symbol = lock(&self.orders)
            .get(&order_id)
            .map(|o| o.symbol.clone())
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;
        let price = self
            .price(&symbol)
            .ok_or_else(|| BrokerError::NotTradable(symbol.clone()))?;
        self.execute_at_price(order_id, price)
    }

    /// Fill an open order against `market_price`, applying slippage and fees.
    ///
    /// A fill the account cannot afford rejects the order.
    pub fn execute_at_price(&self, order_id: Uuid, market_price: Decimal) -> Result<Order, BrokerError> {
        let now = self.now();
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Ok(order.clone());
        }

        let fill_price = self.config.slippage.fill_price(order.side, market_price);

        if order.order_type == OrderType::Limit {
            if let Some(limit) = order.limit_price {
                match order.side {
                    Side::Buy if fill_price > limit => return Ok(order.clone()),
                    Side::Sell if fill_price < limit => return Ok(order.clone()),
                    _ => {}
                }
            }
        }

        let quantity = order.remaining_quantity();
        let value = fill_price * quantity;
        let fee = self.config.fees.fee(value);

        let mut portfolio = lock(&self.portfolio);
        match order.side {
            Side::Buy => {
                self.refresh_buying_power(&mut portfolio);
                let required = value + fee;
                if required > portfolio.buying_power {
                    let err = BrokerError::InsufficientFunds {
                        required,
                        available: portfolio.buying_power,
                    };
                    order.reject(err.to_string(), now);
                    return Err(err);
                }
            }
            Side::Sell => {
                let held = portfolio.quantity(&order.symbol);
                if quantity > held {
                    let err = BrokerError::InvalidQuantity(format!(
                        "sell {quantity} {} exceeds position {held}",
                        order.symbol
                    ));
                    order.reject(err.to_string(), now);
                    return Err(err);
                }
            }
        }

        order.add_fill(Fill {
            order_id,
            quantity,
            price: fill_price,
            fee,
            timestamp: now,
        });

        portfolio.apply_order(order);
        let mark = HashMap::from([(order.symbol.clone(), market_price)]);
        portfolio.update_prices(&mark);
        self.refresh_buying_power(&mut portfolio);

        debug!(
            "Filled {} {} x{} @ {} (fee {})",
            order.side, order.symbol, quantity, fill_price, fee
        );
        Ok(order.clone())
    }

    /// True when equity is below the maintenance fraction of gross exposure.
    pub fn is_margin_call(&self) -> bool {
        let portfolio = lock(&self.portfolio);
        let exposure = portfolio.gross_exposure();
        exposure > Decimal::ZERO && portfolio.equity < self.config.maintenance_margin * exposure
    }

    /// Orders flattening every position, tagged `margin_call`, in symbol order.
    /// Empty unless a margin call is in effect.
    pub fn margin_call_orders(&self) -> Vec<OrderRequest> {
        if !self.is_margin_call() {
            return Vec::new();
        }
        let portfolio = lock(&self.portfolio);
        let mut requests: Vec<OrderRequest> = portfolio
            .positions
            .values()
            .filter(|p| !p.is_flat())
            .map(|p| {
                let side = if p.is_long() { Side::Sell } else { Side::Buy };
                OrderRequest::market(&p.symbol, side, p.quantity.abs()).with_tag("margin_call")
            })
            .collect();
        requests.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        requests
    }

    pub fn portfolio_snapshot(&self) -> Portfolio {
        lock(&self.portfolio).clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = lock(&self.orders).values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn get_account(&self) -> Result<Portfolio, BrokerError> {
        Ok(self.portfolio_snapshot())
    }

    async fn submit_order(&self, request: OrderRequest) -> Result<Order, BrokerError> {
        if request.quantity <= Decimal::ZERO {
            return Err(BrokerError::InvalidQuantity(format!(
                "{} {}: quantity must be positive",
                request.symbol, request.quantity
            )));
        }
        if self.price(&request.symbol).is_none() {
            return Err(BrokerError::NotTradable(request.symbol));
        }

        let order = Order::from_request(&request, self.now());
        lock(&self.orders).insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        let uuid = Uuid::parse_str(order_id)
            .map_err(|_| BrokerError::OrderNotFound(order_id.to_string()))?;
        lock(&self.orders)
            .get(&uuid)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        Ok(lock(&self.portfolio).positions.values().cloned().collect())
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError> {
        Ok(lock(&self.portfolio).positions.get(symbol).cloned())
    }

    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError> {
        let (side, quantity) = {
            let portfolio = lock(&self.portfolio);
            let position = portfolio
                .positions
                .get(symbol)
                .ok_or_else(|| BrokerError::PositionNotFound(symbol.to_string()))?;
            let side = if position.is_long() { Side::Sell } else { Side::Buy };
            (side, position.quantity.abs())
        };

        let request = OrderRequest::market(symbol, side, quantity).with_tag("close");
        self.submit_order(request).await
    }

    fn name(&self) -> &str {
        "Paper Broker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::types::OrderStatus;

    fn prices(entries: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[tokio::test]
    async fn test_paper_broker_buy() {
        let broker = PaperBroker::new(PaperBrokerConfig::default());
        broker.update_prices(&prices(&[("AAPL", dec!(150))]));

        let request = OrderRequest::market("AAPL", Side::Buy, dec!(100));
        let order = broker.submit_order(request).await.unwrap();
        assert_eq!(order.status, OrderStatus::Submitted);

        let filled = broker.execute(order.id).unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        // 0.05% slippage against the buyer
        assert_eq!(filled.filled_avg_price, Some(dec!(150.075)));
        // $1 + 0.1% of 15,007.50
        assert_eq!(filled.fees, dec!(16.0075));

        let portfolio = broker.get_account().await.unwrap();
        assert_eq!(portfolio.quantity("AAPL"), dec!(100));
        assert_eq!(portfolio.cash, dec!(100000) - dec!(15007.5) - dec!(16.0075));
    }

    #[tokio::test]
    async fn test_paper_broker_close_position() {
        let broker = PaperBroker::with_capital(dec!(100000));
        broker.update_prices(&prices(&[("AAPL", dec!(150))]));

        let buy = OrderRequest::market("AAPL", Side::Buy, dec!(100));
        let order = broker.submit_order(buy).await.unwrap();
        broker.execute(order.id).unwrap();

        broker.update_prices(&prices(&[("AAPL", dec!(155))]));
        let close_order = broker.close_position("AAPL").await.unwrap();
        assert_eq!(close_order.tag.as_deref(), Some("close"));
        broker.execute(close_order.id).unwrap();

        assert!(broker.get_position("AAPL").await.unwrap().is_none());
        let portfolio = broker.get_account().await.unwrap();
        assert_eq!(portfolio.total_realized_pnl, dec!(500));
        assert_eq!(portfolio.cash, dec!(100500));
    }

    #[tokio::test]
    async fn test_unpriced_symbol_not_tradable() {
        let broker = PaperBroker::with_capital(dec!(1000));
        let result = broker
            .submit_order(OrderRequest::market("NOPE", Side::Buy, dec!(1)))
            .await;
        assert_eq!(result.unwrap_err(), BrokerError::NotTradable("NOPE".into()));
    }

    #[tokio::test]
    async fn test_insufficient_funds_rejects_order() {
        let broker = PaperBroker::with_capital(dec!(1000));
        broker.update_prices(&prices(&[("AAPL", dec!(150))]));

        let order = broker
            .submit_order(OrderRequest::market("AAPL", Side::Buy, dec!(10)))
            .await
            .unwrap();
        let err = broker.execute(order.id).unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientFunds { .. }));

        let stored = broker.get_order(&order.id.to_string()).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Rejected);
        assert_eq!(broker.portfolio_snapshot().cash, dec!(1000));
    }

    #[tokio::test]
    async fn test_sell_beyond_position_rejected() {
        let broker = PaperBroker::with_capital(dec!(1000));
        broker.update_prices(&prices(&[("AAPL", dec!(10))]));
        let order = broker
            .submit_order(OrderRequest::market("AAPL", Side::Sell, dec!(5)))
            .await
            .unwrap();
        assert!(matches!(
            broker.execute(order.id),
            Err(BrokerError::InvalidQuantity(_))
        ));
    }

    #[tokio::test]
    async fn test_margin_call_with_leverage() {
        let broker = PaperBroker::new(PaperBrokerConfig {
            initial_capital: dec!(10000),
            fees: FeeModel::free(),
            slippage: SlippageModel::none(),
            leverage: dec!(4),
            maintenance_margin: dec!(0.25),
        });
        broker.update_prices(&prices(&[("XYZ", dec!(100))]));
        let order = broker
            .submit_order(OrderRequest::market("XYZ", Side::Buy, dec!(300)))
            .await
            .unwrap();
        broker.execute(order.id).unwrap();
        assert!(!broker.is_margin_call());

        // equity -20000 + 300 * 85 = 5500 < 0.25 * 25500
        broker.update_prices(&prices(&[("XYZ", dec!(85))]));
        assert!(broker.is_margin_call());
        let orders = broker.margin_call_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[0].quantity, dec!(300));
        assert_eq!(orders[0].tag.as_deref(), Some("margin_call"));
    }

    #[tokio::test]
    async fn test_fill_timestamp_uses_host_clock() {
        let broker = PaperBroker::with_capital(dec!(1000));
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        broker.set_time(at);
        broker.update_prices(&prices(&[("AAPL", dec!(10))]));
        let order = broker
            .submit_order(OrderRequest::market("AAPL", Side::Buy, dec!(1)))
            .await
            .unwrap();
        let filled = broker.execute(order.id).unwrap();
        assert_eq!(filled.created_at, at);
        assert_eq!(filled.fills[0].timestamp, at);
    }
}
