//! Entry signals and exit reasons.

use serde::{Deserialize, Serialize};

use super::Bar;

/// A confirmed entry, produced once per armed-then-confirmed cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub symbol: String,
    /// Bar that armed the signal
    pub armed_bar: Bar,
    /// Bar that confirmed it; the order is attempted on this bar
    pub confirmed_bar: Bar,
    /// ATR at confirmation, if ready
    pub atr: Option<f64>,
}

impl EntrySignal {
    /// Bars between arming and confirmation, by timestamp order.
    pub fn latency_ms(&self) -> i64 {
        self.confirmed_bar.timestamp - self.armed_bar.timestamp
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    MaxHoldingPeriod,
    UniverseExit,
    /// No bracket could be formed after the entry filled
    NoBracket,
    MarginCall,
    EndOfRun,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::MaxHoldingPeriod => "max_holding_period",
            ExitReason::UniverseExit => "universe_exit",
            ExitReason::NoBracket => "no_bracket",
            ExitReason::MarginCall => "margin_call",
            ExitReason::EndOfRun => "end_of_run",
        }
    }

    /// Inverse of [`ExitReason::as_str`], used to recover reasons from order tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "stop_loss" => ExitReason::StopLoss,
            "take_profit" => ExitReason::TakeProfit,
            "max_holding_period" => ExitReason::MaxHoldingPeriod,
            "universe_exit" => ExitReason::UniverseExit,
            "no_bracket" => ExitReason::NoBracket,
            "margin_call" => ExitReason::MarginCall,
            "end_of_run" => ExitReason::EndOfRun,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
