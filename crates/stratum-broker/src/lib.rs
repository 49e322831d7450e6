//! Broker implementations.

mod fees;
mod paper;

pub use fees::{FeeModel, SlippageModel};
pub use paper::{PaperBroker, PaperBrokerConfig};
