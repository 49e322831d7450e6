//! Bracket exits for invested instruments.

use rust_decimal::Decimal;
use stratum_core::types::{ExitReason, Slice};
use stratum_risk::BracketBook;
use tracing::debug;

/// An exit the monitor decided on this bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub symbol: String,
    pub reason: ExitReason,
    /// Close that triggered the exit
    pub price: Decimal,
}

/// Advances every bracket that has a bar in the slice and checks it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionMonitor;

impl PositionMonitor {
    /// Triggered brackets are removed from the book.
    pub fn check(&self, brackets: &mut BracketBook, slice: &Slice) -> Vec<ExitDecision> {
        let now = slice.datetime();
        let mut exits = Vec::new();

        for symbol in brackets.symbols() {
            let Some(bar) = slice.get(&symbol) else {
                continue;
            };
            let Ok(price) = Decimal::try_from(bar.close) else {
                continue;
            };
            let Some(bracket) = brackets.get_mut(&symbol) else {
                continue;
            };

            bracket.advance();
            if let Some(reason) = bracket.check(price, now) {
                debug!(
                    "Bracket exit {} ({}) at {}: stop {}, target {}, {} bars held",
                    symbol,
                    reason,
                    price,
                    bracket.stop_price,
                    bracket.target_price,
                    bracket.bars_held
                );
                brackets.close(&symbol);
                exits.push(ExitDecision {
                    symbol,
                    reason,
                    price,
                });
            }
        }
        exits
    }
}
