//! Backtest statistics.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_core::types::{ExitReason, Portfolio, Side};

/// One execution in the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub tag: Option<String>,
    /// Set when the order tag names an exit reason
    pub exit_reason: Option<ExitReason>,
    /// Realized PnL, before fees, for executions that reduce a position
    pub pnl: Option<Decimal>,
}

/// Backtest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub annualized_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Annualized, risk-free rate of 0
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Executions of any kind
    pub total_trades: usize,
    /// Executions that closed or reduced a position
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// Gross profit / gross loss
    pub profit_factor: Decimal,
    pub total_fees: Decimal,
    pub orders_rejected: usize,
    pub margin_calls: usize,
    /// Closing executions per exit reason tag
    pub exits_by_reason: BTreeMap<String, usize>,
    /// Time steps replayed
    pub bars_processed: usize,
    pub equity_curve: Vec<(i64, Decimal)>,
    pub trades: Vec<TradeRecord>,
    peak_equity: Decimal,
    daily_returns: Vec<f64>,
}

impl BacktestStats {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_equity: initial_capital,
            total_return_pct: Decimal::ZERO,
            annualized_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            total_trades: 0,
            closed_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            orders_rejected: 0,
            margin_calls: 0,
            exits_by_reason: BTreeMap::new(),
            bars_processed: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_capital,
            daily_returns: Vec::new(),
        }
    }

    /// Record equity at the end of a time step.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        if let Some((_, prev_equity)) = self.equity_curve.last() {
            if *prev_equity > Decimal::ZERO {
                let ret = ((equity - *prev_equity) / *prev_equity)
                    .to_f64()
                    .unwrap_or(0.0);
                self.daily_returns.push(ret);
            }
        }

        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }

        self.bars_processed += 1;
    }

    pub fn add_trade(&mut self, trade: TradeRecord) {
        if trade.pnl.is_some() {
            if let Some(tag) = &trade.tag {
                *self.exits_by_reason.entry(tag.clone()).or_default() += 1;
            }
        }
        self.total_fees += trade.fee;
        self.trades.push(trade);
        self.total_trades += 1;
    }

    pub fn record_rejection(&mut self) {
        self.orders_rejected += 1;
    }

    pub fn record_margin_call(&mut self) {
        self.margin_calls += 1;
    }

    /// Percent drawdown from the running peak at each equity point.
    pub fn drawdown_curve(&self) -> Vec<(i64, Decimal)> {
        let mut peak = self.initial_capital;
        self.equity_curve
            .iter()
            .map(|&(ts, equity)| {
                peak = peak.max(equity);
                let dd = if peak > Decimal::ZERO {
                    (peak - equity) / peak * dec!(100)
                } else {
                    Decimal::ZERO
                };
                (ts, dd)
            })
            .collect()
    }

    /// Compute the summary figures from the trade log and equity curve.
    pub fn finalize(&mut self, portfolio: &Portfolio) {
        self.final_equity = portfolio.equity;

        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct =
                (self.final_equity - self.initial_capital) / self.initial_capital * dec!(100);
        }

        // Daily bars, 252 sessions a year.
        if !self.equity_curve.is_empty() {
            let days = self.equity_curve.len() as f64;
            let total_return = self.total_return_pct.to_f64().unwrap_or(0.0) / 100.0;
            let annualized = ((1.0 + total_return).powf(252.0 / days) - 1.0) * 100.0;
            self.annualized_return_pct = Decimal::try_from(annualized).unwrap_or(Decimal::ZERO);
        }

        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;
        self.closed_trades = 0;
        self.winning_trades = 0;
        self.losing_trades = 0;

        for pnl in self.trades.iter().filter_map(|t| t.pnl) {
            self.closed_trades += 1;
            if pnl > Decimal::ZERO {
                self.winning_trades += 1;
                total_profit += pnl;
            } else if pnl < Decimal::ZERO {
                self.losing_trades += 1;
                total_loss += pnl.abs();
            }
        }

        if self.closed_trades > 0 {
            self.win_rate_pct =
                Decimal::from(self.winning_trades * 100) / Decimal::from(self.closed_trades);
        }
        if self.winning_trades > 0 {
            self.avg_win = total_profit / Decimal::from(self.winning_trades);
        }
        if self.losing_trades > 0 {
            self.avg_loss = total_loss / Decimal::from(self.losing_trades);
        }
        if total_loss > Decimal::ZERO {
            self.profit_factor = total_profit / total_loss;
        }

        if !self.daily_returns.is_empty() {
            let n = self.daily_returns.len() as f64;
            let mean = self.daily_returns.iter().sum::<f64>() / n;
            let variance = self
                .daily_returns
                .iter()
                .map(|r| (r - mean).powi(2))
                .sum::<f64>()
                / n;
            let std_dev = variance.sqrt();
            if std_dev > 0.0 {
                self.sharpe_ratio = (mean * 252.0_f64.sqrt()) / std_dev;
            }

            let negative: Vec<f64> = self
                .daily_returns
                .iter()
                .filter(|&&r| r < 0.0)
                .copied()
                .collect();
            if !negative.is_empty() {
                let downside_variance =
                    negative.iter().map(|r| r.powi(2)).sum::<f64>() / negative.len() as f64;
                let downside_dev = downside_variance.sqrt();
                if downside_dev > 0.0 {
                    self.sortino_ratio = (mean * 252.0_f64.sqrt()) / downside_dev;
                }
            }
        }
    }
}
