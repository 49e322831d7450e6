//! Broker trait definition.

use crate::error::BrokerError;
use crate::types::{Order, OrderRequest, Portfolio, Position};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Order execution and account state.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Snapshot of cash, equity and positions.
    async fn get_account(&self) -> Result<Portfolio, BrokerError>;

    /// Submit an order. The returned order may already be filled.
    async fn submit_order(&self, request: OrderRequest) -> Result<Order, BrokerError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError>;

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError>;

    /// Market order flattening the whole position.
    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError>;

    async fn get_buying_power(&self) -> Result<Decimal, BrokerError> {
        Ok(self.get_account().await?.buying_power)
    }

    fn name(&self) -> &str;
}
