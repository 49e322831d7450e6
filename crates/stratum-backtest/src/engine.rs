//! Backtesting engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use stratum_broker::{PaperBroker, PaperBrokerConfig};
use stratum_core::traits::{Algorithm, Broker, EngineAction};
use stratum_core::types::{
    Bar, ExitReason, OrderEvent, OrderRequest, OrderStatus, SecurityChanges, Side, Slice,
};
use stratum_data::FundamentalsStore;
use tracing::{debug, info, warn};

use crate::report::BacktestReport;
use crate::statistics::{BacktestStats, TradeRecord};

/// Backtest configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub broker: PaperBrokerConfig,
    /// First replayed date; earlier bars only serve as history
    pub start: Option<NaiveDate>,
    /// Last replayed date, inclusive
    pub end: Option<NaiveDate>,
}

impl BacktestConfig {
    fn in_range(&self, bar: &Bar) -> bool {
        let date = bar.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Replays bars through an [`Algorithm`] against a [`PaperBroker`].
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run a backtest over `data` (bars per symbol, oldest first).
    ///
    /// With `fundamentals`, universe selection runs on every date that has a
    /// snapshot. Without, the universe is set once on the first step: the
    /// algorithm's static list, or every symbol with data.
    pub async fn run(
        &self,
        algorithm: &mut dyn Algorithm,
        data: &HashMap<String, Vec<Bar>>,
        fundamentals: Option<&FundamentalsStore>,
    ) -> BacktestReport {
        let broker = PaperBroker::new(self.config.broker.clone());
        let mut stats = BacktestStats::new(self.config.broker.initial_capital);

        let subscriptions: BTreeSet<String> = algorithm.subscriptions().into_iter().collect();
        let history_len = algorithm.history_request();

        let mut timeline: BTreeMap<i64, Slice> = BTreeMap::new();
        for (symbol, bars) in data {
            for bar in bars.iter().filter(|b| self.config.in_range(b)) {
                timeline
                    .entry(bar.timestamp)
                    .or_insert_with(|| Slice::new(bar.timestamp))
                    .insert(symbol.clone(), *bar);
            }
        }

        info!(
            "Backtest of {} over {} steps, {} symbols",
            algorithm.name(),
            timeline.len(),
            data.len()
        );

        let mut universe: BTreeSet<String> = BTreeSet::new();
        let mut first_step = true;

        for (&timestamp, full_slice) in &timeline {
            let now = full_slice.datetime();
            broker.set_time(now);
            let prices: HashMap<String, Decimal> = full_slice
                .bars
                .iter()
                .filter_map(|(s, b)| Decimal::try_from(b.close).ok().map(|p| (s.clone(), p)))
                .collect();
            broker.update_prices(&prices);

            if first_step && history_len > 0 {
                for symbol in &subscriptions {
                    let history = history_before(data, symbol, timestamp, history_len);
                    algorithm.on_history(symbol, history);
                }
            }

            let selection = match fundamentals {
                Some(store) => store
                    .on(now.date_naive())
                    .and_then(|snapshot| algorithm.select_universe(snapshot)),
                None if first_step => Some(algorithm.select_universe(&[]).unwrap_or_else(|| {
                    data.keys()
                        .filter(|s| !subscriptions.contains(*s))
                        .cloned()
                        .collect()
                })),
                None => None,
            };
            first_step = false;

            if let Some(next) = selection {
                let next: BTreeSet<String> = next.into_iter().collect();
                let changes = SecurityChanges::between(&universe, &next);
                if !changes.is_empty() {
                    info!(
                        "Universe change on {}: +{} -{}",
                        now.date_naive(),
                        changes.added.len(),
                        changes.removed.len()
                    );
                    let portfolio = broker.portfolio_snapshot();
                    let actions = algorithm.on_securities_changed(&changes, &portfolio);
                    if history_len > 0 {
                        for symbol in &changes.added {
                            let history = history_before(data, symbol, timestamp, history_len);
                            algorithm.on_history(symbol, history);
                        }
                    }
                    self.process(&broker, algorithm, actions, &mut stats).await;
                }
                universe = next;
            }

            let margin_orders = broker.margin_call_orders();
            if !margin_orders.is_empty() {
                warn!(
                    "Margin call on {}: {} liquidation orders",
                    now.date_naive(),
                    margin_orders.len()
                );
                stats.record_margin_call();
                let portfolio = broker.portfolio_snapshot();
                let ordered = algorithm.on_margin_call(margin_orders, &portfolio);
                for request in ordered {
                    if !broker.is_margin_call() {
                        break;
                    }
                    let actions = self
                        .execute(&broker, algorithm, request, &mut stats)
                        .await;
                    self.process(&broker, algorithm, actions, &mut stats).await;
                }
            }

            let mut slice = Slice::new(timestamp);
            for (symbol, bar) in &full_slice.bars {
                if universe.contains(symbol) || subscriptions.contains(symbol) {
                    slice.insert(symbol.clone(), *bar);
                }
            }
            let portfolio = broker.portfolio_snapshot();
            let actions = algorithm.on_data(&slice, &portfolio);
            self.process(&broker, algorithm, actions, &mut stats).await;

            stats.record_equity(timestamp, broker.portfolio_snapshot().equity);
        }

        let portfolio = broker.portfolio_snapshot();
        let actions = algorithm.on_end_of_algorithm(&portfolio);
        self.process(&broker, algorithm, actions, &mut stats).await;

        let final_portfolio = broker.portfolio_snapshot();
        stats.finalize(&final_portfolio);
        info!(
            "Backtest complete: equity {:.2}, return {:.2}%, {} trades",
            stats.final_equity, stats.total_return_pct, stats.total_trades
        );

        BacktestReport {
            algorithm: algorithm.name().to_string(),
            config: self.config.clone(),
            stats,
            final_portfolio,
            charts: Vec::new(),
        }
    }

    /// Execute actions in order, feeding each order event back to the
    /// algorithm and queueing whatever it returns.
    async fn process(
        &self,
        broker: &PaperBroker,
        algorithm: &mut dyn Algorithm,
        actions: Vec<EngineAction>,
        stats: &mut BacktestStats,
    ) {
        let mut queue: VecDeque<EngineAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            let request = match action {
                EngineAction::Submit(request) => request,
                EngineAction::Liquidate { symbol, reason } => {
                    match liquidation_request(broker, &symbol, reason) {
                        Some(request) => request,
                        None => {
                            debug!("Nothing to liquidate for {} ({})", symbol, reason);
                            continue;
                        }
                    }
                }
            };
            let follow_ups = self.execute(broker, algorithm, request, stats).await;
            queue.extend(follow_ups);
        }
    }

    /// Submit and fill one order, then report the outcome to the algorithm.
    async fn execute(
        &self,
        broker: &PaperBroker,
        algorithm: &mut dyn Algorithm,
        request: OrderRequest,
        stats: &mut BacktestStats,
    ) -> Vec<EngineAction> {
        let now = broker.now();
        let before = broker.portfolio_snapshot();

        let event = match broker.submit_order(request.clone()).await {
            Ok(order) => match broker.execute(order.id) {
                Ok(filled) => OrderEvent::from_order(&filled),
                Err(e) => OrderEvent {
                    order_id: order.id,
                    ..OrderEvent::rejected(&request, e.to_string(), now)
                },
            },
            Err(e) => OrderEvent::rejected(&request, e.to_string(), now),
        };

        let after = broker.portfolio_snapshot();
        if event.is_fill() {
            let held = before.quantity(&event.symbol);
            let reduces = !held.is_zero() && held.is_sign_negative() == (event.side == Side::Buy);
            stats.add_trade(TradeRecord {
                timestamp: event.timestamp,
                symbol: event.symbol.clone(),
                side: event.side,
                quantity: event.fill_quantity,
                price: event.fill_price,
                fee: event.fee,
                tag: event.tag.clone(),
                exit_reason: event.tag.as_deref().and_then(ExitReason::from_tag),
                pnl: reduces.then(|| after.total_realized_pnl - before.total_realized_pnl),
            });
        } else if event.status == OrderStatus::Rejected {
            stats.record_rejection();
            debug!(
                "Order rejected: {} {} x{}: {}",
                request.side,
                request.symbol,
                request.quantity,
                event.message.as_deref().unwrap_or("")
            );
        }

        algorithm.on_order_event(&event, &after)
    }
}

/// Up to `count` bars strictly before `timestamp`, oldest first.
fn history_before<'a>(
    data: &'a HashMap<String, Vec<Bar>>,
    symbol: &str,
    timestamp: i64,
    count: usize,
) -> &'a [Bar] {
    let Some(bars) = data.get(symbol) else {
        return &[];
    };
    let end = bars.partition_point(|b| b.timestamp < timestamp);
    &bars[end.saturating_sub(count)..end]
}

fn liquidation_request(
    broker: &PaperBroker,
    symbol: &str,
    reason: ExitReason,
) -> Option<OrderRequest> {
    let quantity = broker.portfolio_snapshot().quantity(symbol);
    if quantity.is_zero() {
        return None;
    }
    let side = if quantity.is_sign_positive() {
        Side::Sell
    } else {
        Side::Buy
    };
    Some(OrderRequest::market(symbol, side, quantity.abs()).with_tag(reason.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stratum_core::types::{Fundamental, Portfolio};

    const DAY_MS: i64 = 86_400_000;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64 * DAY_MS, c, c, c, c, 1_000.0))
            .collect()
    }

    fn frictionless() -> BacktestConfig {
        BacktestConfig {
            broker: PaperBrokerConfig {
                initial_capital: dec!(10000),
                fees: stratum_broker::FeeModel::free(),
                slippage: stratum_broker::SlippageModel::none(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Buys 10 shares on the first bar and holds.
    #[derive(Default)]
    struct BuyOnce {
        bought: bool,
        changes: Vec<SecurityChanges>,
        events: Vec<OrderEvent>,
        history: Vec<(String, usize)>,
        ended: bool,
    }

    impl Algorithm for BuyOnce {
        fn name(&self) -> &str {
            "buy_once"
        }

        fn on_securities_changed(
            &mut self,
            changes: &SecurityChanges,
            _portfolio: &Portfolio,
        ) -> Vec<EngineAction> {
            self.changes.push(changes.clone());
            changes
                .removed
                .iter()
                .map(|s| EngineAction::Liquidate {
                    symbol: s.clone(),
                    reason: ExitReason::UniverseExit,
                })
                .collect()
        }

        fn history_request(&self) -> usize {
            2
        }

        fn on_history(&mut self, symbol: &str, bars: &[Bar]) {
            self.history.push((symbol.to_string(), bars.len()));
        }

        fn on_data(&mut self, slice: &Slice, _portfolio: &Portfolio) -> Vec<EngineAction> {
            if self.bought || !slice.contains("AAA") {
                return Vec::new();
            }
            self.bought = true;
            vec![EngineAction::Submit(
                OrderRequest::market("AAA", Side::Buy, dec!(10)).with_tag("entry"),
            )]
        }

        fn on_order_event(&mut self, event: &OrderEvent, _portfolio: &Portfolio) -> Vec<EngineAction> {
            self.events.push(event.clone());
            Vec::new()
        }

        fn on_end_of_algorithm(&mut self, portfolio: &Portfolio) -> Vec<EngineAction> {
            self.ended = true;
            portfolio
                .positions
                .keys()
                .map(|s| EngineAction::Liquidate {
                    symbol: s.clone(),
                    reason: ExitReason::EndOfRun,
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn test_buy_and_liquidate_at_end() {
        let data = HashMap::from([("AAA".to_string(), bars(&[100.0, 105.0, 110.0]))]);
        let mut algo = BuyOnce::default();
        let report = BacktestEngine::new(frictionless())
            .run(&mut algo, &data, None)
            .await;

        assert!(algo.ended);
        assert_eq!(algo.changes[0].added, vec!["AAA"]);
        assert_eq!(report.stats.bars_processed, 3);
        assert_eq!(report.stats.total_trades, 2);
        assert_eq!(report.stats.closed_trades, 1);
        assert_eq!(report.stats.final_equity, dec!(10100));
        assert_eq!(report.final_portfolio.invested_count(), 0);

        let exit = &report.stats.trades[1];
        assert_eq!(exit.exit_reason, Some(ExitReason::EndOfRun));
        assert_eq!(exit.pnl, Some(dec!(100)));
        assert_eq!(algo.events.len(), 2);
        assert!(algo.events.iter().all(|e| e.is_fill()));
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let data = HashMap::from([("AAA".to_string(), bars(&[5000.0, 5000.0]))]);
        let mut algo = BuyOnce::default();
        let report = BacktestEngine::new(frictionless())
            .run(&mut algo, &data, None)
            .await;

        assert_eq!(report.stats.total_trades, 0);
        assert_eq!(report.stats.orders_rejected, 1);
        assert_eq!(algo.events[0].status, OrderStatus::Rejected);
        assert!(algo.events[0].message.is_some());
    }

    #[tokio::test]
    async fn test_start_date_leaves_history_for_warmup() {
        let data = HashMap::from([("AAA".to_string(), bars(&[1.0, 2.0, 3.0, 4.0]))]);
        let mut config = frictionless();
        config.start = Some(NaiveDate::from_ymd_opt(1970, 1, 3).unwrap());
        let mut algo = BuyOnce::default();
        let report = BacktestEngine::new(config).run(&mut algo, &data, None).await;

        assert_eq!(report.stats.bars_processed, 2);
        assert_eq!(algo.history, vec![("AAA".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_rule_engine_round_trip() {
        use stratum_engine::{Condition, RuleSet, StrategyEngine};

        // roc(14) -20, -16 (arms), -14 (confirms at 86); the next close hits the stop
        let closes: Vec<f64> = std::iter::repeat(100.0)
            .take(20)
            .chain([80.0, 84.0, 86.0, 60.0])
            .collect();
        let data = HashMap::from([("AAA".to_string(), bars(&closes))]);
        let mut config = frictionless();
        config.start = NaiveDate::from_ymd_opt(1970, 1, 11);

        let rules = RuleSet::new(
            "roc",
            vec![
                Condition::RocBetween { min: -30.0, max: -15.0 },
                Condition::RocRisingFrom { lag: 1 },
            ],
        );
        let mut engine = StrategyEngine::new(rules).unwrap();
        let report = BacktestEngine::new(config).run(&mut engine, &data, None).await;

        assert_eq!(report.stats.bars_processed, 14);
        assert_eq!(report.stats.total_trades, 2);
        assert_eq!(engine.stats().signals_armed, 1);
        assert_eq!(engine.stats().entries_filled, 1);

        let entry = &report.stats.trades[0];
        assert_eq!(entry.tag.as_deref(), Some("entry"));
        assert_eq!(entry.side, Side::Buy);
        assert_eq!(entry.price, dec!(86));
        // 10% of 10000 at 86
        assert_eq!(entry.quantity, dec!(11));

        let exit = &report.stats.trades[1];
        assert_eq!(exit.exit_reason, Some(ExitReason::StopLoss));
        assert_eq!(exit.price, dec!(60));
        assert_eq!(exit.pnl, Some(dec!(-286)));
        assert_eq!(report.stats.exits_by_reason.get("stop_loss"), Some(&1));
        assert!(engine.brackets().is_empty());
        assert_eq!(report.final_portfolio.invested_count(), 0);
    }

    #[tokio::test]
    async fn test_fundamentals_drive_universe() {
        let data = HashMap::from([
            ("AAA".to_string(), bars(&[10.0, 11.0, 12.0])),
            ("BBB".to_string(), bars(&[20.0, 21.0, 22.0])),
        ]);

        /// Picks whatever the snapshot lists.
        #[derive(Default)]
        struct Follow(BuyOnce);

        impl Algorithm for Follow {
            fn name(&self) -> &str {
                "follow"
            }
            fn select_universe(&mut self, fundamentals: &[Fundamental]) -> Option<Vec<String>> {
                Some(fundamentals.iter().map(|f| f.symbol.clone()).collect())
            }
            fn on_securities_changed(
                &mut self,
                changes: &SecurityChanges,
                portfolio: &Portfolio,
            ) -> Vec<EngineAction> {
                self.0.on_securities_changed(changes, portfolio)
            }
            fn on_data(&mut self, slice: &Slice, portfolio: &Portfolio) -> Vec<EngineAction> {
                self.0.on_data(slice, portfolio)
            }
        }

        let mut store = FundamentalsStore::default();
        let day = |d: u32| NaiveDate::from_ymd_opt(1970, 1, d).unwrap();
        let snapshot = |s: &str| Fundamental {
            symbol: s.to_string(),
            ..Default::default()
        };
        store.insert(day(1), snapshot("AAA"));
        store.insert(day(2), snapshot("BBB"));

        let mut algo = Follow::default();
        let report = BacktestEngine::new(frictionless())
            .run(&mut algo, &data, Some(&store))
            .await;

        assert_eq!(algo.0.changes.len(), 2);
        assert_eq!(algo.0.changes[1].removed, vec!["AAA"]);
        assert_eq!(algo.0.changes[1].added, vec!["BBB"]);
        let exit = report.stats.trades.last().unwrap();
        assert_eq!(exit.exit_reason, Some(ExitReason::UniverseExit));
        assert_eq!(exit.price, dec!(11));
    }
}
