//! Dated fundamentals snapshots for universe selection.
//!
//! CSV columns: `date,symbol,market_cap,sector,dollar_volume,price,has_fundamental_data,etfs`.
//! `sector` is a Morningstar code and may be blank; `etfs` lists constituencies
//! separated by `;` or `|`.

use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use stratum_core::error::DataError;
use stratum_core::types::Fundamental;
use tracing::debug;

use crate::csv_source::parse_timestamp;

#[derive(Debug, Deserialize)]
struct FundamentalRecord {
    date: String,
    symbol: String,
    #[serde(default)]
    market_cap: f64,
    #[serde(default)]
    sector: Option<u32>,
    #[serde(default)]
    dollar_volume: f64,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    has_fundamental_data: Option<String>,
    #[serde(default)]
    etfs: Option<String>,
}

fn parse_flag(raw: Option<&str>) -> Result<bool, DataError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(true),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(DataError::ParseError(format!(
            "has_fundamental_data: expected a boolean, got '{other}'"
        ))),
    }
}

fn record_date(raw: &str) -> Result<NaiveDate, DataError> {
    let ms = parse_timestamp(raw)?;
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::ParseError(format!("date out of range: {raw}")))
}

/// Read fundamentals rows grouped by date.
pub fn read_fundamentals<R: Read>(reader: R) -> Result<FundamentalsStore, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut store = FundamentalsStore::default();
    for result in reader.deserialize() {
        let record: FundamentalRecord =
            result.map_err(|e| DataError::ParseError(e.to_string()))?;
        let date = record_date(&record.date)?;

        let etfs = record
            .etfs
            .as_deref()
            .unwrap_or_default()
            .split(|c| c == ';' || c == '|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        store.insert(
            date,
            Fundamental {
                symbol: record.symbol,
                market_cap: record.market_cap,
                sector_code: record.sector,
                dollar_volume: record.dollar_volume,
                price: record.price,
                has_fundamental_data: parse_flag(record.has_fundamental_data.as_deref())?,
                etfs,
            },
        );
    }
    Ok(store)
}

/// Fundamentals keyed by date.
#[derive(Debug, Clone, Default)]
pub struct FundamentalsStore {
    by_date: BTreeMap<NaiveDate, Vec<Fundamental>>,
}

impl FundamentalsStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let store = read_fundamentals(std::fs::File::open(path)?)?;
        debug!(
            "Loaded fundamentals for {} dates from {}",
            store.by_date.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn insert(&mut self, date: NaiveDate, fundamental: Fundamental) {
        self.by_date.entry(date).or_default().push(fundamental);
    }

    /// Snapshot for exactly `date`.
    pub fn on(&self, date: NaiveDate) -> Option<&[Fundamental]> {
        self.by_date.get(&date).map(Vec::as_slice)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}
