//! Streaming technical indicators.
//!
//! Every indicator is updated one observation at a time, which is how the
//! engine feeds them from each time step. The batch [`Indicator`] impls run the
//! same streaming code over a slice, so both paths always agree.
//!
//! - Moving averages (simple, Wilder's)
//! - Momentum (RSI, rate of change)
//! - Volatility (ATR, Bollinger Bands)
//!
//! [`Indicator`]: stratum_core::traits::Indicator

pub mod momentum;
pub mod moving_average;
pub mod volatility;

pub use momentum::{Roc, Rsi};
pub use moving_average::{MovingAverage, MovingAverageKind};
pub use volatility::{Atr, BollingerBands, BollingerOutput};
