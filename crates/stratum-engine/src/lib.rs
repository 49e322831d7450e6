//! Rule-driven strategy engine.
//!
//! One [`StrategyEngine`] replaces a family of near-identical strategy scripts.
//! Behaviour comes from a declarative [`RuleSet`]: trigger and confirmation
//! conditions feed a per-instrument `IDLE -> ARMED -> CONFIRMED` state machine,
//! confirmed entries are sized by the risk crate, and every filled entry gets
//! an ATR stop/target bracket with holding limits.
//!
//! Per-instrument state lives in an [`InstrumentRegistry`] whose entries are
//! created when a symbol joins the universe and destroyed when it leaves.

mod charts;
mod engine;
mod instrument;
mod monitor;
mod presets;
mod registry;
mod rules;
mod signal;
mod universe;

pub use charts::{ChartPoint, ChartRecorder};
pub use engine::{EngineStats, StrategyEngine};
pub use instrument::{InstrumentState, PendingEntry, SignalPhase};
pub use monitor::{ExitDecision, PositionMonitor};
pub use presets::{PresetInfo, PresetRegistry};
pub use registry::{InstrumentId, InstrumentRegistry};
pub use rules::{Condition, IndicatorSettings, MarketFilter, RuleSet};
pub use signal::{SignalEvaluator, SignalOutcome};
pub use universe::{CapTier, Sector, UniverseFilter};
