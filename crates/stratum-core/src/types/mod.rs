//! Core data types.

mod ohlcv;
mod order;
mod params;
mod position;
mod signal;
mod slice;
mod universe;
mod window;

pub use ohlcv::{Bar, BarSeries};
pub use order::{Fill, Order, OrderEvent, OrderRequest, OrderStatus, OrderType, Side};
pub use params::{ParameterValue, Parameters};
pub use position::{Portfolio, Position};
pub use signal::{EntrySignal, ExitReason};
pub use slice::Slice;
pub use universe::{Fundamental, SecurityChanges};
pub use window::RollingWindow;
