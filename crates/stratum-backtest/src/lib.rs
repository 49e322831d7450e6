//! Replay host simulator.
//!
//! Drives any [`stratum_core::Algorithm`] over historical bars, executing its
//! actions on the paper broker and collecting statistics.

mod engine;
mod report;
mod statistics;

pub use engine::{BacktestConfig, BacktestEngine};
pub use report::{BacktestReport, ChartRow, ReportError};
pub use statistics::{BacktestStats, TradeRecord};
