//! Backtest command implementation.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use stratum_backtest::{BacktestEngine, ChartRow};
use stratum_config::AppConfig;
use stratum_core::traits::{Algorithm, DataSource};
use stratum_core::types::Bar;
use stratum_data::{CsvDataSource, FundamentalsStore};
use stratum_engine::{PresetRegistry, RuleSet, StrategyEngine, UniverseFilter};
use tracing::{info, warn};

use crate::cli::{BacktestArgs, OutputFormat};

pub async fn run(args: BacktestArgs, config: &AppConfig) -> Result<()> {
    let mut rules = build_rules(&args, config)?;
    if !args.symbols.is_empty() {
        rules.universe = UniverseFilter::fixed(args.symbols.iter().map(|s| s.to_uppercase()));
    }
    if args.plot {
        rules.plot_indicators = true;
    }
    info!("Starting backtest for rule set: {}", rules.name);

    let mut engine = StrategyEngine::new(rules)
        .context("Invalid rule set")?
        .with_margin_call_policy(config.strategy.margin_call_policy);

    let mut settings = config.backtest.clone();
    if let Some(dir) = &args.data {
        settings.data_dir = dir.clone();
    }
    if let Some(path) = &args.fundamentals {
        settings.fundamentals = Some(path.clone());
    }
    if let Some(capital) = args.capital {
        settings.initial_capital =
            Decimal::try_from(capital).context("Initial capital is not a valid amount")?;
    }
    settings.start = args.start.or(settings.start);
    settings.end = args.end.or(settings.end);
    settings.validate().context("Invalid backtest settings")?;

    let source = CsvDataSource::new(&settings.data_dir).with_context(|| {
        format!(
            "Data directory '{}' does not exist. Provide a directory of <SYMBOL>.csv files (e.g. --data ./data)",
            settings.data_dir.display()
        )
    })?;
    let data = load_data(&source, &engine).await?;

    let fundamentals = settings
        .fundamentals
        .as_ref()
        .map(|path| {
            FundamentalsStore::load(path)
                .with_context(|| format!("Failed to load fundamentals from {}", path.display()))
        })
        .transpose()?;

    let backtest = BacktestEngine::new(settings.to_backtest_config());
    let report = backtest.run(&mut engine, &data, fundamentals.as_ref()).await;

    let charts = engine
        .charts()
        .rows()
        .map(|(symbol, series, point)| ChartRow {
            symbol: symbol.to_string(),
            series: series.to_string(),
            timestamp: point.timestamp,
            value: point.value,
        })
        .collect();
    let report = report.with_charts(charts);

    let stats = engine.stats();
    info!(
        "Signals: {} armed, {} confirmed, {} discarded, {} filtered; entries: {} submitted, {} filled, {} rejected",
        stats.signals_armed,
        stats.signals_confirmed,
        stats.signals_discarded,
        stats.signals_filtered,
        stats.entries_submitted,
        stats.entries_filled,
        stats.entries_rejected
    );

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(dir) = &args.export {
        let files = report
            .export(dir)
            .with_context(|| format!("Failed to export report to {}", dir.display()))?;
        info!("Exported {} files to {}", files.len(), dir.display());
    }

    Ok(())
}

/// CLI preset first, then an inline rule set from config, then the configured preset.
fn build_rules(args: &BacktestArgs, config: &AppConfig) -> Result<RuleSet> {
    let mut params = config.strategy.parameters.clone();
    params.merge(&args.parameters());

    let preset = match (&args.preset, &config.strategy.rules) {
        (Some(name), _) => name.clone(),
        (None, Some(rules)) => {
            if !args.params.is_empty() {
                warn!("--param overrides are ignored for an inline rule set");
            }
            return Ok(rules.clone());
        }
        (None, None) => config.strategy.preset.clone(),
    };

    let registry = PresetRegistry::new();
    registry
        .create(&preset, &params)
        .with_context(|| format!("Failed to build preset '{preset}'"))
}

async fn load_data(
    source: &CsvDataSource,
    engine: &StrategyEngine,
) -> Result<HashMap<String, Vec<Bar>>> {
    let universe = &engine.rules().universe;
    let mut symbols: BTreeSet<String> = if universe.is_static() {
        universe.symbols.iter().cloned().collect()
    } else {
        source.available_symbols().await?.into_iter().collect()
    };
    let subscriptions = engine.subscriptions();
    symbols.extend(subscriptions.iter().cloned());

    let mut data = HashMap::new();
    for symbol in symbols {
        match source.get_historical_bars(&symbol, None, None).await {
            Ok(bars) if !bars.is_empty() => {
                data.insert(symbol, bars);
            }
            Ok(_) => warn!("No bars for {}", symbol),
            Err(e) if subscriptions.contains(&symbol) => {
                warn!("Market filter symbol {} unavailable, entries will not be filtered: {}", symbol, e)
            }
            Err(e) => warn!("Skipping {}: {}", symbol, e),
        }
    }

    if data.is_empty() {
        bail!("No data loaded from {}", source.dir().display());
    }

    info!("Loaded data for {} symbols", data.len());
    Ok(data)
}
