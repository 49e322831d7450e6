//! CLI command implementations.

pub mod backtest;
pub mod presets;
pub mod validate;
