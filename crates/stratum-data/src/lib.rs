//! Historical data for the replay host: per-symbol CSV bars and dated
//! fundamentals snapshots.

mod cache;
mod csv_source;
mod fundamentals;

pub use cache::DataCache;
pub use csv_source::{parse_timestamp, read_bars, CsvDataSource};
pub use fundamentals::{read_fundamentals, FundamentalsStore};

use std::path::Path;
use stratum_core::error::DataError;
use stratum_core::types::Bar;

/// Load bars from a single CSV file, oldest first.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, DataError> {
    let file = std::fs::File::open(path.as_ref())?;
    read_bars(file)
}
