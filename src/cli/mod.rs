//! CLI definitions.

pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stratum_core::types::{ParameterValue, Parameters};

#[derive(Parser)]
#[command(name = "stratum")]
#[command(author, version, about = "Rule-driven equity strategy engine with a replay backtester")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level; overrides the configured verbosity
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay historical bars through a strategy
    Backtest(BacktestArgs),
    /// List built-in presets and their parameters
    Presets,
    /// Validate configuration
    ValidateConfig,
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Preset to run; overrides the configured strategy
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Directory of <SYMBOL>.csv bar files
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Trade exactly these symbols (comma-separated) instead of selecting a universe
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Fundamentals CSV for universe selection
    #[arg(long)]
    pub fundamentals: Option<PathBuf>,

    /// Preset parameter override, `key=value` (repeatable)
    #[arg(short = 'P', long = "param", value_parser = parse_param)]
    pub params: Vec<(String, ParameterValue)>,

    /// Initial capital
    #[arg(long)]
    pub capital: Option<f64>,

    /// First replayed date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last replayed date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Record indicator series for plotting
    #[arg(long)]
    pub plot: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Write report.json and CSV exports into this directory
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl BacktestArgs {
    pub fn parameters(&self) -> Parameters {
        self.params.iter().cloned().collect()
    }
}

fn parse_param(raw: &str) -> Result<(String, ParameterValue), String> {
    Parameters::parse_assignment(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtest_args_parse() {
        let cli = Cli::try_parse_from([
            "stratum",
            "backtest",
            "--preset",
            "roc_rebound",
            "-P",
            "roc_min=-30",
            "--param",
            "use_vix_filter=false",
            "-S",
            "AAPL,MSFT",
            "--start",
            "2020-01-02",
            "--output",
            "json",
        ])
        .unwrap();

        let Commands::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        let params = args.parameters();
        assert_eq!(params.get_f64("roc_min", 0.0).unwrap(), -30.0);
        assert!(!params.get_bool("use_vix_filter", true).unwrap());
        assert_eq!(args.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2020, 1, 2));
        assert!(matches!(args.output, OutputFormat::Json));
    }

    #[test]
    fn test_bad_param_rejected() {
        assert!(Cli::try_parse_from(["stratum", "backtest", "-P", "nokey"]).is_err());
    }
}
