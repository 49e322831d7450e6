//! The strategy engine: a rule set driven through the host callbacks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_core::error::EngineError;
use stratum_core::traits::{Algorithm, EngineAction};
use stratum_core::types::{
    Bar, EntrySignal, ExitReason, Fundamental, OrderEvent, OrderRequest, OrderStatus, Portfolio,
    SecurityChanges, Slice,
};
use stratum_risk::{Bracket, BracketBook, MarginCallPolicy, RiskManager};
use tracing::{debug, info, trace, warn};

use crate::charts::ChartRecorder;
use crate::instrument::{InstrumentState, PendingEntry};
use crate::monitor::PositionMonitor;
use crate::registry::{InstrumentId, InstrumentRegistry};
use crate::rules::RuleSet;
use crate::signal::{SignalEvaluator, SignalOutcome};

/// Counters kept over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub signals_armed: usize,
    pub signals_confirmed: usize,
    /// Confirmed signals that produced no order
    pub signals_discarded: usize,
    /// Armed signals dropped because the market filter blocked entries
    pub signals_filtered: usize,
    pub entries_submitted: usize,
    pub entries_filled: usize,
    pub entries_rejected: usize,
    /// Exit fills by reason
    pub exits: BTreeMap<String, usize>,
}

/// Runs a [`RuleSet`] across a changing universe of instruments.
pub struct StrategyEngine {
    rules: RuleSet,
    registry: InstrumentRegistry,
    brackets: BracketBook,
    risk: RiskManager,
    margin_policy: MarginCallPolicy,
    monitor: PositionMonitor,
    reference_close: Option<f64>,
    charts: ChartRecorder,
    stats: EngineStats,
}

impl StrategyEngine {
    pub fn new(rules: RuleSet) -> Result<Self, EngineError> {
        rules.validate()?;
        Ok(Self {
            risk: RiskManager::new(rules.risk.clone()),
            registry: InstrumentRegistry::new(),
            brackets: BracketBook::new(),
            margin_policy: MarginCallPolicy::default(),
            monitor: PositionMonitor,
            reference_close: None,
            charts: ChartRecorder::new(),
            stats: EngineStats::default(),
            rules,
        })
    }

    pub fn with_margin_call_policy(mut self, policy: MarginCallPolicy) -> Self {
        self.margin_policy = policy;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn brackets(&self) -> &BracketBook {
        &self.brackets
    }

    pub fn charts(&self) -> &ChartRecorder {
        &self.charts
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    fn entries_allowed(&self) -> bool {
        self.rules
            .market_filter
            .as_ref()
            .map_or(true, |filter| filter.allows(self.reference_close))
    }

    fn pending_entries(&self) -> usize {
        self.registry
            .iter()
            .filter(|s| s.pending_entry.is_some())
            .count()
    }

    fn update_instruments(&mut self, slice: &Slice) -> Vec<InstrumentId> {
        let mut updated = Vec::new();
        for id in self.registry.ids() {
            let Some(state) = self.registry.get_mut(id) else {
                continue;
            };
            if let Some(bar) = slice.get(state.symbol()) {
                if state.update(bar) {
                    trace_bar(state);
                    updated.push(id);
                }
            }
        }
        updated
    }

    /// Turn a confirmed signal into an entry order, or explain why not.
    fn size_entry(
        &self,
        signal: &EntrySignal,
        portfolio: &Portfolio,
        committed: usize,
    ) -> Result<OrderRequest, String> {
        let price = Decimal::try_from(signal.confirmed_bar.close)
            .map_err(|e| format!("unusable close {}: {e}", signal.confirmed_bar.close))?;
        if price <= Decimal::ZERO {
            return Err(format!("close must be positive, got {price}"));
        }

        let stop_hint = signal
            .atr
            .and_then(|atr| Decimal::try_from(atr).ok())
            .filter(|atr| *atr > Decimal::ZERO)
            .map(|atr| price - self.rules.bracket.stop_atr_multiple * atr);

        self.risk
            .size_entry(portfolio, &signal.symbol, price, stop_hint, committed)
            .into_order()
    }

    fn record_charts(&mut self, updated: &[InstrumentId], portfolio: &Portfolio) {
        for &id in updated {
            let Some(state) = self.registry.get(id) else {
                continue;
            };
            let symbol = state.symbol();
            if !state.phase.is_armed() && !portfolio.is_invested(symbol) {
                continue;
            }
            let Some(bar) = state.bar() else {
                continue;
            };
            let ts = bar.timestamp;

            self.charts.record(symbol, "close", ts, bar.close);
            if let Some(rsi) = state.rsi() {
                self.charts.record(symbol, "rsi", ts, rsi);
            }
            if let Some(bands) = state.bands() {
                self.charts.record(symbol, "bb_upper", ts, bands.upper);
                self.charts.record(symbol, "bb_lower", ts, bands.lower);
                self.charts.record(symbol, "bb_width", ts, bands.bandwidth);
            }
            if let Some(atr) = state.atr() {
                self.charts.record(symbol, "atr", ts, atr);
            }
            if let Some(roc) = state.roc(0) {
                self.charts.record(symbol, "roc", ts, roc);
            }
            if let Some(bracket) = self.brackets.get(symbol) {
                if let (Ok(stop), Ok(target)) = (
                    f64::try_from(bracket.stop_price),
                    f64::try_from(bracket.target_price),
                ) {
                    self.charts.record(symbol, "stop", ts, stop);
                    self.charts.record(symbol, "target", ts, target);
                }
            }
        }
    }

    fn on_entry_event(&mut self, event: &OrderEvent, portfolio: &Portfolio) -> Vec<EngineAction> {
        let symbol = event.symbol.as_str();

        match event.status {
            OrderStatus::Rejected | OrderStatus::Canceled => {
                self.stats.entries_rejected += 1;
                if let Some(state) = self.registry.by_symbol_mut(symbol) {
                    state.pending_entry = None;
                }
                warn!(
                    "Entry for {} {}: {}",
                    symbol,
                    event.status,
                    event.message.as_deref().unwrap_or("no reason given")
                );
                Vec::new()
            }
            OrderStatus::Filled if event.is_fill() => {
                self.stats.entries_filled += 1;
                let Some(state) = self.registry.by_symbol_mut(symbol) else {
                    warn!("Entry filled for {} after it left the universe", symbol);
                    return vec![EngineAction::Liquidate {
                        symbol: symbol.to_string(),
                        reason: ExitReason::UniverseExit,
                    }];
                };
                state.pending_entry = None;

                let atr = state
                    .atr()
                    .and_then(|atr| Decimal::try_from(atr).ok())
                    .unwrap_or(Decimal::ZERO);
                let quantity = match portfolio.quantity(symbol) {
                    q if q > Decimal::ZERO => q,
                    _ => event.fill_quantity,
                };

                let opened = Bracket::from_fill(
                    symbol,
                    quantity,
                    event.fill_price,
                    atr,
                    &self.rules.bracket,
                    event.timestamp,
                )
                .and_then(|bracket| self.brackets.open(bracket).cloned());

                match opened {
                    Ok(bracket) => {
                        info!(
                            "Entered {} x{} @ {} (stop {}, target {})",
                            symbol,
                            quantity,
                            event.fill_price,
                            bracket.stop_price,
                            bracket.target_price
                        );
                        Vec::new()
                    }
                    Err(EngineError::BracketAlreadyOpen(_)) => {
                        debug!("Bracket already open for {}, keeping it", symbol);
                        Vec::new()
                    }
                    Err(e) => {
                        warn!("No bracket for {}: {}; liquidating", symbol, e);
                        vec![EngineAction::Liquidate {
                            symbol: symbol.to_string(),
                            reason: ExitReason::NoBracket,
                        }]
                    }
                }
            }
            _ => Vec::new(),
        }
    }
}

fn trace_bar(state: &InstrumentState) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    let Some(bar) = state.bar() else {
        return;
    };
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    let bands = state.bands().map_or_else(
        || "-".to_string(),
        |b| format!("{:.2}/{:.2}/{:.2}", b.upper, b.middle, b.lower),
    );
    trace!(
        "{} O {} H {} L {} C {} V {} | RSI {} BB {} ATR {} ROC {} | {}",
        state.symbol(),
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        bar.volume,
        fmt(state.rsi()),
        bands,
        fmt(state.atr()),
        fmt(state.roc(0)),
        if state.phase.is_armed() { "armed" } else { "idle" }
    );
}

impl Algorithm for StrategyEngine {
    fn name(&self) -> &str {
        &self.rules.name
    }

    fn subscriptions(&self) -> Vec<String> {
        self.rules
            .market_filter
            .iter()
            .map(|filter| filter.symbol.clone())
            .collect()
    }

    fn select_universe(&mut self, fundamentals: &[Fundamental]) -> Option<Vec<String>> {
        if self.rules.universe.is_static() {
            return Some(self.rules.universe.symbols.clone());
        }
        if fundamentals.is_empty() {
            return None;
        }
        Some(self.rules.universe.select(fundamentals))
    }

    fn on_securities_changed(
        &mut self,
        changes: &SecurityChanges,
        portfolio: &Portfolio,
    ) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        for symbol in &changes.removed {
            if portfolio.is_invested(symbol) {
                actions.push(EngineAction::Liquidate {
                    symbol: symbol.clone(),
                    reason: ExitReason::UniverseExit,
                });
            }
            self.brackets.close(symbol);
            if let Err(e) = self.registry.remove(symbol) {
                debug!("Removing {}: {}", symbol, e);
            }
        }

        for symbol in &changes.added {
            if self.registry.contains(symbol) {
                continue;
            }
            let state = InstrumentState::new(symbol.as_str(), &self.rules.indicators);
            if let Err(e) = self.registry.add(state) {
                warn!("Adding {}: {}", symbol, e);
            }
        }

        debug!(
            "Universe: +{} -{} ({} tracked)",
            changes.added.len(),
            changes.removed.len(),
            self.registry.len()
        );
        actions
    }

    fn history_request(&self) -> usize {
        self.rules.warmup_bars()
    }

    fn on_history(&mut self, symbol: &str, bars: &[Bar]) {
        if let Some(filter) = &self.rules.market_filter {
            if filter.symbol == symbol {
                if let Some(last) = bars.last() {
                    self.reference_close = Some(last.close);
                }
            }
        }
        if let Some(state) = self.registry.by_symbol_mut(symbol) {
            let applied = state.warm_up(bars);
            debug!("Warmed up {} with {} bars", symbol, applied);
        }
    }

    fn on_data(&mut self, slice: &Slice, portfolio: &Portfolio) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        let now = slice.datetime();

        if let Some(filter) = &self.rules.market_filter {
            if let Some(bar) = slice.get(&filter.symbol) {
                self.reference_close = Some(bar.close);
            }
        }

        let updated = self.update_instruments(slice);

        for dropped in self.brackets.retain(|b| portfolio.is_invested(&b.symbol)) {
            info!("{} closed outside the engine, dropping its bracket", dropped.symbol);
        }

        for exit in self.monitor.check(&mut self.brackets, slice) {
            info!("Exit {} ({}) at {}", exit.symbol, exit.reason, exit.price);
            actions.push(EngineAction::Liquidate {
                symbol: exit.symbol,
                reason: exit.reason,
            });
        }

        let allowed = self.entries_allowed();
        let mut committed = portfolio.invested_count() + self.pending_entries();

        for &id in &updated {
            let Some(state) = self.registry.get_mut(id) else {
                continue;
            };
            let symbol = state.symbol().to_string();

            if portfolio.is_invested(&symbol)
                || state.pending_entry.is_some()
                || self.brackets.contains(&symbol)
            {
                state.disarm();
                continue;
            }
            if !allowed {
                if state.phase.is_armed() {
                    self.stats.signals_filtered += 1;
                    debug!("Market filter blocks entries, disarming {}", symbol);
                }
                state.disarm();
                continue;
            }

            let signal = match SignalEvaluator::new(&self.rules).step(state) {
                SignalOutcome::Armed => {
                    self.stats.signals_armed += 1;
                    debug!("Armed {} at {}", symbol, now);
                    continue;
                }
                SignalOutcome::Confirmed(signal) => signal,
                _ => continue,
            };
            self.stats.signals_confirmed += 1;

            match self.size_entry(&signal, portfolio, committed) {
                Ok(order) => {
                    info!(
                        "Entry signal {}: buy {} at ~{}",
                        symbol, order.quantity, signal.confirmed_bar.close
                    );
                    if let Some(state) = self.registry.get_mut(id) {
                        state.pending_entry = Some(PendingEntry {
                            submitted_at: now,
                            signal_price: signal.confirmed_bar.close,
                        });
                    }
                    committed += 1;
                    self.stats.entries_submitted += 1;
                    actions.push(EngineAction::Submit(order));
                }
                Err(reason) => {
                    self.stats.signals_discarded += 1;
                    info!("Entry signal {} discarded: {}", symbol, reason);
                }
            }
        }

        if self.rules.plot_indicators {
            self.record_charts(&updated, portfolio);
        }
        actions
    }

    fn on_order_event(&mut self, event: &OrderEvent, portfolio: &Portfolio) -> Vec<EngineAction> {
        match event.tag.as_deref() {
            Some("entry") => self.on_entry_event(event, portfolio),
            tag => {
                if event.status == OrderStatus::Filled && event.is_fill() {
                    if !portfolio.is_invested(&event.symbol) {
                        self.brackets.close(&event.symbol);
                    }
                    let reason = tag.unwrap_or("manual").to_string();
                    *self.stats.exits.entry(reason.clone()).or_default() += 1;
                    debug!(
                        "Exit filled {} x{} @ {} ({})",
                        event.symbol, event.fill_quantity, event.fill_price, reason
                    );
                } else if event.status == OrderStatus::Rejected {
                    warn!(
                        "Exit order for {} rejected: {}",
                        event.symbol,
                        event.message.as_deref().unwrap_or("no reason given")
                    );
                }
                Vec::new()
            }
        }
    }

    fn on_margin_call(
        &mut self,
        requests: Vec<OrderRequest>,
        portfolio: &Portfolio,
    ) -> Vec<OrderRequest> {
        // Brackets stay open until their liquidation fills; the host stops
        // once the call clears.
        let ordered = self.margin_policy.apply(requests, portfolio);
        warn!(
            "Margin call: {} liquidation order(s) ({:?})",
            ordered.len(),
            self.margin_policy
        );
        ordered
    }

    fn on_end_of_algorithm(&mut self, portfolio: &Portfolio) -> Vec<EngineAction> {
        let actions: Vec<EngineAction> = portfolio
            .positions
            .values()
            .filter(|p| !p.is_flat())
            .map(|p| EngineAction::Liquidate {
                symbol: p.symbol.clone(),
                reason: ExitReason::EndOfRun,
            })
            .collect();
        for symbol in self.brackets.symbols() {
            self.brackets.close(&symbol);
        }
        info!(
            "{} finished: {} armed, {} confirmed, {} entries filled",
            self.rules.name,
            self.stats.signals_armed,
            self.stats.signals_confirmed,
            self.stats.entries_filled
        );
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Condition, IndicatorSettings, MarketFilter};
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use stratum_core::types::{Fill, Order, Side};
    use stratum_risk::PositionSizingMethod;

    const DAY: i64 = 86_400_000;

    fn bar(day: i64, close: f64) -> Bar {
        Bar::new(day * DAY, close, close + 1.0, close - 1.0, close, 10_000.0)
    }

    fn roc_rules() -> RuleSet {
        let mut rules = RuleSet::new(
            "roc",
            vec![
                Condition::RocBetween { min: -30.0, max: -15.0 },
                Condition::RocRisingFrom { lag: 1 },
            ],
        );
        rules.indicators = IndicatorSettings {
            roc_period: 14,
            roc_history: 2,
            ..Default::default()
        };
        rules
    }

    fn engine_with(rules: RuleSet, symbols: &[&str]) -> StrategyEngine {
        let mut engine = StrategyEngine::new(rules).unwrap();
        let changes = SecurityChanges {
            added: symbols.iter().map(|s| s.to_string()).collect(),
            removed: vec![],
        };
        engine.on_securities_changed(&changes, &Portfolio::new(dec!(100000)));
        engine
    }

    /// Runs 20 flat days at 100, then the given closes. Returns the actions per day.
    fn run(
        engine: &mut StrategyEngine,
        portfolio: &Portfolio,
        closes: &[f64],
        extra: impl Fn(i64) -> Option<(String, Bar)>,
    ) -> Vec<Vec<EngineAction>> {
        let mut days = Vec::new();
        let all: Vec<f64> = std::iter::repeat(100.0).take(20).chain(closes.iter().copied()).collect();
        for (day, close) in all.into_iter().enumerate() {
            let day = day as i64;
            let mut slice = Slice::new(day * DAY).with_bar("ABC", bar(day, close));
            if let Some((symbol, b)) = extra(day) {
                slice.insert(symbol, b);
            }
            days.push(engine.on_data(&slice, portfolio));
        }
        days
    }

    fn fill_event(request: &OrderRequest, price: Decimal, day: i64) -> (Order, OrderEvent) {
        let at = DateTime::<Utc>::from_timestamp_millis(day * DAY).unwrap();
        let mut order = Order::from_request(request, at);
        order.add_fill(Fill {
            order_id: order.id,
            quantity: request.quantity,
            price,
            fee: Decimal::ZERO,
            timestamp: at,
        });
        let event = OrderEvent::from_order(&order);
        (order, event)
    }

    #[test]
    fn test_rebound_confirms_one_bar_after_arming() {
        let mut engine = engine_with(roc_rules(), &["ABC"]);
        let portfolio = Portfolio::new(dec!(100000));

        // roc: -20 (not rising), -16 (rising: arm), -14 (confirm next bar)
        let days = run(&mut engine, &portfolio, &[80.0, 84.0, 86.0], |_| None);

        let submits: Vec<(usize, &EngineAction)> = days
            .iter()
            .enumerate()
            .flat_map(|(day, actions)| actions.iter().map(move |a| (day, a)))
            .collect();
        assert_eq!(submits.len(), 1);
        let (day, action) = submits[0];
        assert_eq!(day, 22);
        match action {
            EngineAction::Submit(order) => {
                assert_eq!(order.symbol, "ABC");
                assert_eq!(order.side, Side::Buy);
                assert_eq!(order.tag.as_deref(), Some("entry"));
                // 10% of 100k at 86
                assert_eq!(order.quantity, dec!(116));
            }
            other => panic!("expected submit, got {other:?}"),
        }
        assert_eq!(engine.stats().signals_armed, 1);
        assert_eq!(engine.stats().entries_submitted, 1);
    }

    #[test]
    fn test_fill_opens_bracket_and_stop_exits() {
        let mut engine = engine_with(roc_rules(), &["ABC"]);
        let mut portfolio = Portfolio::new(dec!(100000));
        let days = run(&mut engine, &portfolio, &[80.0, 84.0, 86.0], |_| None);
        let EngineAction::Submit(request) = &days[22][0] else {
            panic!("expected submit");
        };

        let (order, event) = fill_event(request, dec!(86), 22);
        portfolio.apply_order(&order);
        assert!(engine.on_order_event(&event, &portfolio).is_empty());

        let bracket = engine.brackets().get("ABC").unwrap().clone();
        assert_eq!(bracket.entry_price, dec!(86));
        assert!(bracket.stop_price < dec!(86));
        assert!(bracket.target_price > dec!(86));

        let slice = Slice::new(23 * DAY).with_bar("ABC", bar(23, 60.0));
        let actions = engine.on_data(&slice, &portfolio);
        assert_eq!(
            actions,
            vec![EngineAction::Liquidate {
                symbol: "ABC".into(),
                reason: ExitReason::StopLoss,
            }]
        );
        assert!(engine.brackets().is_empty());
    }

    #[test]
    fn test_discarded_signal_is_not_retried() {
        let mut engine = engine_with(roc_rules(), &["ABC"]);
        let broke = Portfolio::new(Decimal::ZERO);

        let days = run(&mut engine, &broke, &[80.0, 84.0, 86.0, 87.0], |_| None);

        assert!(days.iter().all(|actions| actions.is_empty()));
        assert_eq!(engine.stats().signals_confirmed, 1);
        assert_eq!(engine.stats().signals_discarded, 1);
        assert!(!engine.registry().by_symbol("ABC").unwrap().phase.is_armed());
    }

    #[test]
    fn test_market_filter_blocks_entries() {
        let mut rules = roc_rules();
        rules.market_filter = Some(MarketFilter {
            symbol: "VIX".into(),
            max_close: 20.0,
        });
        let mut engine = engine_with(rules, &["ABC"]);
        assert_eq!(engine.subscriptions(), vec!["VIX"]);

        let portfolio = Portfolio::new(dec!(100000));
        let days = run(&mut engine, &portfolio, &[80.0, 84.0, 86.0], |day| {
            Some(("VIX".into(), bar(day, 30.0)))
        });

        assert!(days.iter().all(|actions| actions.is_empty()));
        assert_eq!(engine.stats().entries_submitted, 0);
    }

    #[test]
    fn test_rejected_entry_clears_pending() {
        let mut engine = engine_with(roc_rules(), &["ABC"]);
        let portfolio = Portfolio::new(dec!(100000));
        let days = run(&mut engine, &portfolio, &[80.0, 84.0, 86.0], |_| None);
        let EngineAction::Submit(request) = &days[22][0] else {
            panic!("expected submit");
        };
        assert!(engine.registry().by_symbol("ABC").unwrap().pending_entry.is_some());

        let event = OrderEvent::rejected(request, "insufficient funds", DateTime::default());
        engine.on_order_event(&event, &portfolio);

        assert!(engine.registry().by_symbol("ABC").unwrap().pending_entry.is_none());
        assert_eq!(engine.stats().entries_rejected, 1);
        assert!(engine.brackets().is_empty());
    }

    #[test]
    fn test_fill_without_atr_liquidates() {
        let mut engine = engine_with(roc_rules(), &["ABC"]);
        let mut portfolio = Portfolio::new(dec!(100000));
        engine.on_data(&Slice::new(0).with_bar("ABC", bar(0, 50.0)), &portfolio);

        let request = OrderRequest::market("ABC", Side::Buy, dec!(10)).with_tag("entry");
        let (order, event) = fill_event(&request, dec!(50), 0);
        portfolio.apply_order(&order);

        assert_eq!(
            engine.on_order_event(&event, &portfolio),
            vec![EngineAction::Liquidate {
                symbol: "ABC".into(),
                reason: ExitReason::NoBracket,
            }]
        );
        assert!(engine.brackets().is_empty());
    }

    #[test]
    fn test_universe_removal_liquidates_and_forgets() {
        let mut engine = engine_with(roc_rules(), &["ABC", "XYZ"]);
        let mut portfolio = Portfolio::new(dec!(100000));
        let request = OrderRequest::market("ABC", Side::Buy, dec!(10));
        let (order, _) = fill_event(&request, dec!(50), 0);
        portfolio.apply_order(&order);

        let changes = SecurityChanges {
            added: vec![],
            removed: vec!["ABC".into(), "XYZ".into()],
        };
        let actions = engine.on_securities_changed(&changes, &portfolio);

        assert_eq!(
            actions,
            vec![EngineAction::Liquidate {
                symbol: "ABC".into(),
                reason: ExitReason::UniverseExit,
            }]
        );
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_margin_call_policy_orders() {
        let mut engine = engine_with(roc_rules(), &["A", "B"])
            .with_margin_call_policy(MarginCallPolicy::LargestPositionFirst);
        let mut portfolio = Portfolio::new(dec!(100000));
        for (symbol, qty) in [("A", dec!(10)), ("B", dec!(100))] {
            let request = OrderRequest::market(symbol, Side::Buy, qty);
            let (order, _) = fill_event(&request, dec!(50), 0);
            portfolio.apply_order(&order);
        }

        let requests = vec![
            OrderRequest::market("A", Side::Sell, dec!(10)),
            OrderRequest::market("B", Side::Sell, dec!(100)),
        ];
        let ordered = engine.on_margin_call(requests, &portfolio);
        assert_eq!(ordered[0].symbol, "B");
        assert_eq!(ordered[1].symbol, "A");
    }

    #[test]
    fn test_margin_call_keeps_brackets_of_surviving_positions() {
        let mut engine = engine_with(roc_rules(), &["A", "B"]);
        let mut portfolio = Portfolio::new(dec!(100000));
        for day in 0..20 {
            let slice = Slice::new(day * DAY)
                .with_bar("A", bar(day, 50.0))
                .with_bar("B", bar(day, 50.0));
            engine.on_data(&slice, &portfolio);
        }
        for symbol in ["A", "B"] {
            let request = OrderRequest::market(symbol, Side::Buy, dec!(100)).with_tag("entry");
            let (order, event) = fill_event(&request, dec!(50), 19);
            portfolio.apply_order(&order);
            assert!(engine.on_order_event(&event, &portfolio).is_empty());
        }
        assert_eq!(engine.brackets().len(), 2);

        let requests = ["A", "B"]
            .map(|s| OrderRequest::market(s, Side::Sell, dec!(100)).with_tag("margin_call"))
            .to_vec();
        let ordered = engine.on_margin_call(requests, &portfolio);
        assert_eq!(ordered.len(), 2);
        assert_eq!(engine.brackets().len(), 2);

        // Only the first liquidation executes before the call clears.
        assert_eq!(ordered[0].symbol, "A");
        let (order, event) = fill_event(&ordered[0], dec!(50), 19);
        portfolio.apply_order(&order);
        assert!(engine.on_order_event(&event, &portfolio).is_empty());
        assert!(!engine.brackets().contains("A"));
        assert!(engine.brackets().contains("B"));
        assert_eq!(engine.stats().exits.get("margin_call"), Some(&1));

        let slice = Slice::new(20 * DAY).with_bar("B", bar(20, 10.0));
        assert_eq!(
            engine.on_data(&slice, &portfolio),
            vec![EngineAction::Liquidate {
                symbol: "B".into(),
                reason: ExitReason::StopLoss,
            }]
        );
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_bar_level_trace() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut engine = engine_with(roc_rules(), &["ABC"]);
            let portfolio = Portfolio::new(dec!(100000));
            run(&mut engine, &portfolio, &[80.0], |_| None);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ABC O 80 H 81 L 79 C 80 V 10000"));
        assert!(output.contains("ROC -20.00"));
        assert!(output.contains("BB "));
    }

    #[test]
    fn test_end_of_run_liquidates_everything() {
        let mut engine = engine_with(roc_rules(), &["ABC"]);
        let mut portfolio = Portfolio::new(dec!(100000));
        let request = OrderRequest::market("ABC", Side::Buy, dec!(10));
        let (order, _) = fill_event(&request, dec!(50), 0);
        portfolio.apply_order(&order);

        let actions = engine.on_end_of_algorithm(&portfolio);
        assert_eq!(
            actions,
            vec![EngineAction::Liquidate {
                symbol: "ABC".into(),
                reason: ExitReason::EndOfRun,
            }]
        );
    }

    #[test]
    fn test_static_universe_selection() {
        let mut rules = roc_rules();
        rules.universe = crate::universe::UniverseFilter::fixed(["SPY"]);
        let mut engine = StrategyEngine::new(rules).unwrap();
        assert_eq!(engine.select_universe(&[]), Some(vec!["SPY".to_string()]));
    }

    #[test]
    fn test_sizing_respects_percent_cash() {
        let mut rules = roc_rules();
        rules.risk.sizing = PositionSizingMethod::PercentCash { percent: dec!(1) };
        let mut engine = engine_with(rules, &["ABC"]);
        let portfolio = Portfolio::new(dec!(100000));
        let days = run(&mut engine, &portfolio, &[80.0, 84.0, 86.0], |_| None);
        let EngineAction::Submit(request) = &days[22][0] else {
            panic!("expected submit");
        };
        // 1% of 100k = 1000 / 86
        assert_eq!(request.quantity, dec!(11));
    }
}
