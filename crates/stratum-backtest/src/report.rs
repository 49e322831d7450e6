//! Backtest report generation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stratum_core::types::Portfolio;
use thiserror::Error;

use crate::{BacktestConfig, BacktestStats};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One recorded indicator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    pub symbol: String,
    pub series: String,
    pub timestamp: i64,
    pub value: f64,
}

/// Complete backtest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub algorithm: String,
    pub config: BacktestConfig,
    pub stats: BacktestStats,
    pub final_portfolio: Portfolio,
    /// Indicator series recorded by the algorithm, if any
    pub charts: Vec<ChartRow>,
}

const RULE: &str = "───────────────────────────────────────────────────────────\n";
const BANNER: &str = "═══════════════════════════════════════════════════════════\n";

impl BacktestReport {
    pub fn with_charts(mut self, charts: Vec<ChartRow>) -> Self {
        self.charts = charts;
        self
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut s = String::new();

        s.push_str(BANNER);
        s.push_str(&format!("  BACKTEST REPORT: {}\n", self.algorithm));
        s.push_str(BANNER);
        s.push('\n');

        s.push_str("PERFORMANCE\n");
        s.push_str(RULE);
        s.push_str(&format!("  Initial Capital:     ${:.2}\n", stats.initial_capital));
        s.push_str(&format!("  Final Equity:        ${:.2}\n", stats.final_equity));
        s.push_str(&format!("  Total Return:        {:.2}%\n", stats.total_return_pct));
        s.push_str(&format!("  Annualized Return:   {:.2}%\n", stats.annualized_return_pct));
        s.push_str(&format!("  Max Drawdown:        {:.2}%\n", stats.max_drawdown_pct));
        s.push('\n');

        s.push_str("RISK METRICS\n");
        s.push_str(RULE);
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", stats.sharpe_ratio));
        s.push_str(&format!("  Sortino Ratio:       {:.2}\n", stats.sortino_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", stats.profit_factor));
        s.push_str(&format!("  Margin Calls:        {}\n", stats.margin_calls));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str(RULE);
        s.push_str(&format!("  Executions:          {}\n", stats.total_trades));
        s.push_str(&format!("  Closed Trades:       {}\n", stats.closed_trades));
        s.push_str(&format!("  Winning Trades:      {}\n", stats.winning_trades));
        s.push_str(&format!("  Losing Trades:       {}\n", stats.losing_trades));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", stats.win_rate_pct));
        s.push_str(&format!("  Avg Win:             ${:.2}\n", stats.avg_win));
        s.push_str(&format!("  Avg Loss:            ${:.2}\n", stats.avg_loss));
        s.push_str(&format!("  Total Fees:          ${:.2}\n", stats.total_fees));
        s.push_str(&format!("  Rejected Orders:     {}\n", stats.orders_rejected));
        s.push('\n');

        if !stats.exits_by_reason.is_empty() {
            s.push_str("EXITS\n");
            s.push_str(RULE);
            for (reason, count) in &stats.exits_by_reason {
                s.push_str(&format!("  {:<21}{}\n", format!("{reason}:"), count));
            }
            s.push('\n');
        }

        s.push_str("EXECUTION\n");
        s.push_str(RULE);
        s.push_str(&format!("  Bars Processed:      {}\n", stats.bars_processed));
        s.push_str(&format!("  Chart Points:        {}\n", self.charts.len()));
        s.push('\n');

        s.push_str(BANNER);
        s
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Equity curve with the running drawdown.
    pub fn equity_to_csv(&self) -> Result<String, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["timestamp", "equity", "drawdown_pct"])?;
        let drawdowns = self.stats.drawdown_curve();
        for ((ts, equity), (_, dd)) in self.stats.equity_curve.iter().zip(drawdowns) {
            writer.write_record([ts.to_string(), equity.to_string(), format!("{dd:.4}")])?;
        }
        into_string(writer)
    }

    pub fn trades_to_csv(&self) -> Result<String, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "timestamp", "symbol", "side", "quantity", "price", "fee", "tag", "pnl",
        ])?;
        for t in &self.stats.trades {
            writer.write_record([
                t.timestamp.to_rfc3339(),
                t.symbol.clone(),
                t.side.to_string(),
                t.quantity.to_string(),
                t.price.to_string(),
                t.fee.to_string(),
                t.tag.clone().unwrap_or_default(),
                t.pnl.map(|p| p.to_string()).unwrap_or_default(),
            ])?;
        }
        into_string(writer)
    }

    pub fn charts_to_csv(&self) -> Result<String, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.charts {
            writer.serialize(row)?;
        }
        into_string(writer)
    }

    /// Write `report.json`, `equity.csv`, `trades.csv` and, when charts were
    /// recorded, `charts.csv` into `dir`.
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ReportError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut files = vec![
            (dir.join("report.json"), self.to_json()?),
            (dir.join("equity.csv"), self.equity_to_csv()?),
            (dir.join("trades.csv"), self.trades_to_csv()?),
        ];
        if !self.charts.is_empty() {
            files.push((dir.join("charts.csv"), self.charts_to_csv()?));
        }

        for (path, contents) in &files {
            fs::write(path, contents)?;
        }
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
