//! Core traits.

mod algorithm;
mod broker;
mod data_source;
mod indicator;

pub use algorithm::{Algorithm, EngineAction};
pub use broker::Broker;
pub use data_source::DataSource;
pub use indicator::{BarIndicator, Indicator, StreamingIndicator};
