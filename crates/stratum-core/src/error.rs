//! Error types for the stratum engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the strategy engine and its rule sets.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid rule set: {0}")]
    InvalidRuleSet(String),

    #[error("Invalid parameter `{key}`: {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Instrument not registered: {0}")]
    UnknownInstrument(String),

    #[error("Instrument already registered: {0}")]
    DuplicateInstrument(String),

    #[error("A bracket is already open for {0}")]
    BracketAlreadyOpen(String),

    #[error("Cannot form bracket for {symbol}: {reason}")]
    BracketUnavailable { symbol: String, reason: String },
}

/// Broker errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Insufficient buying power: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("No price available for {0}")]
    NotTradable(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),
}

/// Data loading errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Indicator calculation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result alias used across the workspace.
pub type StratumResult<T> = Result<T, StratumError>;
