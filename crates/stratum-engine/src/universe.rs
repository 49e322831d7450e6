//! Fundamental universe selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stratum_core::error::EngineError;
use stratum_core::types::Fundamental;

/// Market-capitalisation tier. Each tier includes its lower bound and
/// excludes its upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapTier {
    Micro,
    Small,
    Mid,
    Large,
    Mega,
}

impl CapTier {
    pub const ALL: [CapTier; 5] = [
        CapTier::Micro,
        CapTier::Small,
        CapTier::Mid,
        CapTier::Large,
        CapTier::Mega,
    ];

    /// `[min, max)` in dollars.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            CapTier::Micro => (0.0, 300e6),
            CapTier::Small => (300e6, 2e9),
            CapTier::Mid => (2e9, 10e9),
            CapTier::Large => (10e9, 200e9),
            CapTier::Mega => (200e9, f64::INFINITY),
        }
    }

    pub fn contains(&self, market_cap: f64) -> bool {
        let (min, max) = self.bounds();
        market_cap >= min && market_cap < max
    }

    pub fn of(market_cap: f64) -> Option<CapTier> {
        Self::ALL.into_iter().find(|tier| tier.contains(market_cap))
    }
}

impl FromStr for CapTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "micro" => Ok(CapTier::Micro),
            "small" => Ok(CapTier::Small),
            "mid" => Ok(CapTier::Mid),
            "large" => Ok(CapTier::Large),
            "mega" => Ok(CapTier::Mega),
            other => Err(EngineError::InvalidParameter {
                key: "cap_tiers".into(),
                reason: format!("unknown cap tier '{other}'"),
            }),
        }
    }
}

/// Morningstar sector classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    BasicMaterials,
    ConsumerCyclical,
    FinancialServices,
    RealEstate,
    ConsumerDefensive,
    Healthcare,
    Utilities,
    CommunicationServices,
    Energy,
    Industrials,
    Technology,
}

impl Sector {
    pub const ALL: [Sector; 11] = [
        Sector::BasicMaterials,
        Sector::ConsumerCyclical,
        Sector::FinancialServices,
        Sector::RealEstate,
        Sector::ConsumerDefensive,
        Sector::Healthcare,
        Sector::Utilities,
        Sector::CommunicationServices,
        Sector::Energy,
        Sector::Industrials,
        Sector::Technology,
    ];

    pub fn code(&self) -> u32 {
        match self {
            Sector::BasicMaterials => 101,
            Sector::ConsumerCyclical => 102,
            Sector::FinancialServices => 103,
            Sector::RealEstate => 104,
            Sector::ConsumerDefensive => 205,
            Sector::Healthcare => 206,
            Sector::Utilities => 207,
            Sector::CommunicationServices => 308,
            Sector::Energy => 309,
            Sector::Industrials => 310,
            Sector::Technology => 311,
        }
    }

    pub fn from_code(code: u32) -> Option<Sector> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sector::BasicMaterials => "basic materials",
            Sector::ConsumerCyclical => "consumer cyclical",
            Sector::FinancialServices => "financial services",
            Sector::RealEstate => "real estate",
            Sector::ConsumerDefensive => "consumer defensive",
            Sector::Healthcare => "healthcare",
            Sector::Utilities => "utilities",
            Sector::CommunicationServices => "communication services",
            Sector::Energy => "energy",
            Sector::Industrials => "industrials",
            Sector::Technology => "technology",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Sector {
    type Err = EngineError;

    /// Accepts display names with spaces, dashes or underscores, or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();

        if let Ok(code) = normalized.parse::<u32>() {
            if let Some(sector) = Sector::from_code(code) {
                return Ok(sector);
            }
        }
        Sector::ALL
            .into_iter()
            .find(|sector| sector.to_string() == normalized)
            .ok_or_else(|| EngineError::InvalidParameter {
                key: "sectors".into(),
                reason: format!("unknown sector '{}'", s.trim()),
            })
    }
}

/// Filter applied to each fundamentals snapshot.
///
/// With `symbols` set the universe is static and fundamentals are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseFilter {
    pub symbols: Vec<String>,
    pub require_fundamentals: bool,
    pub min_market_cap: Option<f64>,
    pub max_market_cap: Option<f64>,
    pub cap_tiers: Vec<CapTier>,
    pub sectors: Vec<Sector>,
    /// Keep only constituents of this ETF
    pub etf: Option<String>,
    pub min_price: Option<f64>,
    pub min_dollar_volume: Option<f64>,
    /// Keep the N most liquid survivors
    pub top_by_dollar_volume: Option<usize>,
}

impl UniverseFilter {
    pub fn fixed<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn is_static(&self) -> bool {
        !self.symbols.is_empty()
    }

    pub fn accepts(&self, f: &Fundamental) -> bool {
        if self.require_fundamentals && !f.has_fundamental_data {
            return false;
        }
        if self.min_market_cap.is_some_and(|min| f.market_cap < min)
            || self.max_market_cap.is_some_and(|max| f.market_cap > max)
        {
            return false;
        }
        if !self.cap_tiers.is_empty() && !self.cap_tiers.iter().any(|t| t.contains(f.market_cap)) {
            return false;
        }
        if !self.sectors.is_empty() {
            let in_sector = f
                .sector_code
                .and_then(Sector::from_code)
                .is_some_and(|s| self.sectors.contains(&s));
            if !in_sector {
                return false;
            }
        }
        if let Some(etf) = &self.etf {
            if !f.is_member_of(etf) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| f.price < min) {
            return false;
        }
        if self.min_dollar_volume.is_some_and(|min| f.dollar_volume < min) {
            return false;
        }
        true
    }

    /// Symbols passing the filter, most liquid first, truncated to
    /// `top_by_dollar_volume`.
    pub fn select(&self, fundamentals: &[Fundamental]) -> Vec<String> {
        if self.is_static() {
            return self.symbols.clone();
        }

        let mut passing: Vec<&Fundamental> = fundamentals.iter().filter(|f| self.accepts(f)).collect();
        passing.sort_by(|a, b| {
            b.dollar_volume
                .total_cmp(&a.dollar_volume)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        if let Some(n) = self.top_by_dollar_volume {
            passing.truncate(n);
        }
        passing.into_iter().map(|f| f.symbol.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fundamental(symbol: &str, market_cap: f64, sector: u32, dollar_volume: f64) -> Fundamental {
        Fundamental {
            symbol: symbol.into(),
            market_cap,
            sector_code: Some(sector),
            dollar_volume,
            price: 20.0,
            has_fundamental_data: true,
            etfs: vec![],
        }
    }

    #[test]
    fn test_cap_tier_boundaries() {
        assert_eq!(CapTier::of(299_999_999.0), Some(CapTier::Micro));
        assert_eq!(CapTier::of(300e6), Some(CapTier::Small));
        assert_eq!(CapTier::of(2e9), Some(CapTier::Mid));
        assert_eq!(CapTier::of(10e9), Some(CapTier::Large));
        assert_eq!(CapTier::of(200e9), Some(CapTier::Mega));
        assert_eq!(CapTier::of(-1.0), None);
    }

    #[test]
    fn test_sector_parsing() {
        assert_eq!("healthcare".parse::<Sector>().unwrap(), Sector::Healthcare);
        assert_eq!("Consumer Cyclical".parse::<Sector>().unwrap(), Sector::ConsumerCyclical);
        assert_eq!("consumer_cyclical".parse::<Sector>().unwrap(), Sector::ConsumerCyclical);
        assert_eq!("311".parse::<Sector>().unwrap(), Sector::Technology);
        assert!("crypto".parse::<Sector>().is_err());
    }

    #[test]
    fn test_select_filters_sorts_and_truncates() {
        let filter = UniverseFilter {
            require_fundamentals: true,
            cap_tiers: vec![CapTier::Small],
            sectors: vec![Sector::Healthcare],
            top_by_dollar_volume: Some(2),
            ..Default::default()
        };
        let mut no_data = fundamental("NODATA", 1e9, 206, 9e9);
        no_data.has_fundamental_data = false;

        let snapshot = vec![
            fundamental("AAA", 1e9, 206, 1e6),
            fundamental("BBB", 1e9, 206, 5e6),
            fundamental("CCC", 1e9, 206, 3e6),
            fundamental("TECH", 1e9, 311, 8e6),
            fundamental("BIG", 50e9, 206, 9e6),
            no_data,
        ];

        assert_eq!(filter.select(&snapshot), vec!["BBB", "CCC"]);
    }

    #[test]
    fn test_etf_membership() {
        let filter = UniverseFilter {
            etf: Some("SPY".into()),
            ..Default::default()
        };
        let mut member = fundamental("AAPL", 3e12, 311, 1e10);
        member.etfs = vec!["spy".into(), "QQQ".into()];
        let outsider = fundamental("XYZ", 1e9, 311, 1e6);

        assert!(filter.accepts(&member));
        assert!(!filter.accepts(&outsider));
    }

    #[test]
    fn test_static_universe_ignores_fundamentals() {
        let filter = UniverseFilter::fixed(["SPY", "QQQ"]);
        assert!(filter.is_static());
        assert_eq!(filter.select(&[]), vec!["SPY", "QQQ"]);
    }
}
