//! Core types and traits for the stratum engine.
//!
//! This crate holds the vocabulary shared by every other crate:
//! - Market data (Bar, BarSeries, Slice, RollingWindow)
//! - Orders, fills, order events and the portfolio
//! - Universe data (Fundamental, SecurityChanges)
//! - The key-value parameter store
//! - The host callback trait (`Algorithm`) plus broker, data and indicator traits

pub mod error;
pub mod traits;
pub mod types;

pub use error::{StratumError, StratumResult};
pub use traits::*;
pub use types::*;
