//! Historical data source trait.

use crate::error::DataError;
use crate::types::Bar;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Bars for `symbol`, oldest first, optionally clipped to `[start, end]`.
    async fn get_historical_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, DataError>;

    /// Symbols this source can serve.
    async fn available_symbols(&self) -> Result<Vec<String>, DataError>;

    fn name(&self) -> &str;
}
