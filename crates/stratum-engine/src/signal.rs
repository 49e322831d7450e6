//! Two-stage entry signal: a trigger arms it, a later bar confirms it.

use stratum_core::types::{Bar, EntrySignal};
use tracing::trace;

use crate::instrument::{InstrumentState, SignalPhase};
use crate::rules::{Condition, RuleSet};

/// Result of evaluating one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Nothing,
    /// Trigger held on this bar
    Armed,
    /// Still armed, waiting for confirmation
    Waiting { bars_waited: usize },
    /// Armed signal dropped on this bar without re-arming
    Reset,
    Confirmed(EntrySignal),
}

/// Stateless evaluator over an [`InstrumentState`].
#[derive(Debug, Clone, Copy)]
pub struct SignalEvaluator<'a> {
    rules: &'a RuleSet,
}

impl<'a> SignalEvaluator<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    fn all(conditions: &[Condition], state: &InstrumentState, armed: Option<&Bar>) -> bool {
        conditions.iter().all(|c| c.holds(state, armed))
    }

    fn any(conditions: &[Condition], state: &InstrumentState, armed: Option<&Bar>) -> bool {
        conditions.iter().any(|c| c.holds(state, armed))
    }

    /// Evaluate the instrument's latest bar. Must be called at most once per bar.
    pub fn step(&self, state: &mut InstrumentState) -> SignalOutcome {
        let Some(bar) = state.bar().copied() else {
            return SignalOutcome::Nothing;
        };

        if let SignalPhase::Armed {
            bar: armed_bar,
            bars_waited,
            ..
        } = state.phase.clone()
        {
            // A confirmation is never the bar that armed the signal.
            if bar.timestamp <= armed_bar.timestamp {
                return SignalOutcome::Waiting { bars_waited };
            }

            if Self::all(&self.rules.confirmation, state, Some(&armed_bar)) {
                state.disarm();
                return SignalOutcome::Confirmed(EntrySignal {
                    symbol: state.symbol().to_string(),
                    armed_bar,
                    confirmed_bar: bar,
                    atr: state.atr(),
                });
            }

            let bars_waited = bars_waited + 1;
            let cancelled = Self::any(&self.rules.cancel, state, Some(&armed_bar));
            let expired = self.rules.confirmation_window > 0
                && bars_waited >= self.rules.confirmation_window;

            if !cancelled && !expired {
                if let SignalPhase::Armed { bars_waited: w, .. } = &mut state.phase {
                    *w = bars_waited;
                }
                return SignalOutcome::Waiting { bars_waited };
            }

            trace!(
                "Confirmation missed for {} after {} bars ({})",
                state.symbol(),
                bars_waited,
                if cancelled { "cancelled" } else { "window expired" }
            );
            state.disarm();
            if self.arm(state, bar) {
                return SignalOutcome::Armed;
            }
            return SignalOutcome::Reset;
        }

        if self.arm(state, bar) {
            SignalOutcome::Armed
        } else {
            SignalOutcome::Nothing
        }
    }

    fn arm(&self, state: &mut InstrumentState, bar: Bar) -> bool {
        if !Self::all(&self.rules.trigger, state, None) {
            return false;
        }
        state.phase = SignalPhase::Armed {
            bar,
            armed_at: bar.datetime(),
            bars_waited: 0,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::IndicatorSettings;

    const DAY: i64 = 86_400_000;

    fn bar(day: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(day * DAY, open, high, low, close, 1_000.0)
    }

    fn candle_rules() -> RuleSet {
        let mut rules = RuleSet::new("candles", vec![Condition::RedCandle]);
        rules.confirmation = vec![Condition::GreenCandle, Condition::CloseAboveArmedHigh];
        rules.indicators = IndicatorSettings {
            rsi_period: 2,
            bb_period: 2,
            atr_period: 2,
            roc_period: 2,
            roc_history: 2,
            volume_period: 2,
            sma_period: 2,
            history: 5,
            ..Default::default()
        };
        rules
    }

    fn feed(state: &mut InstrumentState, evaluator: &SignalEvaluator, b: Bar) -> SignalOutcome {
        state.update(&b);
        evaluator.step(state)
    }

    #[test]
    fn test_arm_then_confirm_on_next_bar() {
        let rules = candle_rules();
        let evaluator = SignalEvaluator::new(&rules);
        let mut state = InstrumentState::new("X", &rules.indicators);

        assert_eq!(feed(&mut state, &evaluator, bar(0, 100.0, 101.0, 99.0, 100.0)), SignalOutcome::Nothing);
        assert_eq!(feed(&mut state, &evaluator, bar(1, 100.0, 100.5, 97.0, 98.0)), SignalOutcome::Armed);

        match feed(&mut state, &evaluator, bar(2, 98.0, 102.0, 98.0, 101.0)) {
            SignalOutcome::Confirmed(signal) => {
                assert_eq!(signal.symbol, "X");
                assert_eq!(signal.armed_bar.timestamp, DAY);
                assert_eq!(signal.confirmed_bar.timestamp, 2 * DAY);
                assert_eq!(signal.latency_ms(), DAY);
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
        assert_eq!(state.phase, SignalPhase::Idle);
    }

    #[test]
    fn test_same_bar_never_confirms() {
        let mut rules = candle_rules();
        rules.confirmation.clear();
        let evaluator = SignalEvaluator::new(&rules);
        let mut state = InstrumentState::new("X", &rules.indicators);

        feed(&mut state, &evaluator, bar(0, 100.0, 101.0, 99.0, 100.0));
        assert_eq!(feed(&mut state, &evaluator, bar(1, 100.0, 100.0, 97.0, 98.0)), SignalOutcome::Armed);
        // Re-evaluating the same bar must not confirm.
        assert_eq!(evaluator.step(&mut state), SignalOutcome::Waiting { bars_waited: 0 });
        assert!(matches!(
            feed(&mut state, &evaluator, bar(2, 98.0, 99.0, 95.0, 96.0)),
            SignalOutcome::Confirmed(_)
        ));
    }

    #[test]
    fn test_window_expiry_rearms_on_trigger() {
        let rules = candle_rules();
        let evaluator = SignalEvaluator::new(&rules);
        let mut state = InstrumentState::new("X", &rules.indicators);

        feed(&mut state, &evaluator, bar(0, 100.0, 101.0, 99.0, 100.0));
        feed(&mut state, &evaluator, bar(1, 100.0, 100.0, 97.0, 98.0));
        // Another red candle: not confirmed, window of 1 expired, trigger holds again.
        assert_eq!(feed(&mut state, &evaluator, bar(2, 98.0, 98.0, 95.0, 96.0)), SignalOutcome::Armed);
        match &state.phase {
            SignalPhase::Armed { bar, .. } => assert_eq!(bar.timestamp, 2 * DAY),
            SignalPhase::Idle => panic!("expected armed"),
        }
        // Green but below the armed high of 98: resets.
        assert_eq!(feed(&mut state, &evaluator, bar(3, 96.0, 97.5, 96.0, 97.0)), SignalOutcome::Reset);
        assert_eq!(state.phase, SignalPhase::Idle);
    }

    #[test]
    fn test_unbounded_window_waits_until_cancel() {
        let mut rules = candle_rules();
        rules.confirmation_window = 0;
        rules.confirmation = vec![Condition::CloseAboveArmedHigh];
        rules.cancel = vec![Condition::RedCandle];
        let evaluator = SignalEvaluator::new(&rules);
        let mut state = InstrumentState::new("X", &rules.indicators);

        feed(&mut state, &evaluator, bar(0, 100.0, 101.0, 99.0, 100.0));
        feed(&mut state, &evaluator, bar(1, 100.0, 100.0, 97.0, 98.0));
        let outcome = feed(&mut state, &evaluator, bar(2, 98.0, 101.5, 98.0, 101.0));
        assert_eq!(
            outcome,
            SignalOutcome::Confirmed(EntrySignal {
                symbol: "X".into(),
                armed_bar: bar(1, 100.0, 100.0, 97.0, 98.0),
                confirmed_bar: bar(2, 98.0, 101.5, 98.0, 101.0),
                atr: state.atr(),
            })
        );

        feed(&mut state, &evaluator, bar(3, 99.0, 99.0, 96.0, 97.0));
        assert!(state.phase.is_armed());
        assert_eq!(
            feed(&mut state, &evaluator, bar(4, 97.0, 97.5, 97.0, 97.2)),
            SignalOutcome::Waiting { bars_waited: 1 }
        );
        assert_eq!(
            feed(&mut state, &evaluator, bar(5, 97.2, 97.8, 97.2, 97.5)),
            SignalOutcome::Waiting { bars_waited: 2 }
        );
        // Red candle cancels and re-arms from this bar.
        assert_eq!(feed(&mut state, &evaluator, bar(6, 97.5, 97.5, 96.0, 96.5)), SignalOutcome::Armed);
    }
}
