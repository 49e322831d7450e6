//! Risk management for the strategy engine.
//!
//! Position sizing, ATR stop/target brackets with holding limits,
//! portfolio-level entry limits and margin-call liquidation ordering.

mod bracket;
mod margin_call;
mod portfolio_limits;
mod position_sizer;
mod risk_manager;

pub use bracket::{Bracket, BracketBook, BracketConfig};
pub use margin_call::MarginCallPolicy;
pub use portfolio_limits::{LimitCheck, PortfolioLimits};
pub use position_sizer::{PositionSizer, PositionSizingMethod};
pub use risk_manager::{RiskConfig, RiskDecision, RiskManager};
