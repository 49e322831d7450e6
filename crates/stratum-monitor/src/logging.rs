//! Logging setup.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENGINE_TARGETS: [&str; 3] = ["stratum_engine", "stratum_backtest", "stratum_broker"];

/// How much the engine narrates a run.
///
/// Key events (entries, exits, universe changes) log at `info`, per-signal
/// diagnostics at `debug`, and per-bar indicator detail at `trace`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(from = "u8", into = "u8")]
pub enum Verbosity {
    Off,
    #[default]
    KeyEvents,
    Verbose,
    BarLevel,
}

impl Verbosity {
    /// Levels above 3 clamp to [`Verbosity::BarLevel`].
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Off,
            1 => Verbosity::KeyEvents,
            2 => Verbosity::Verbose,
            _ => Verbosity::BarLevel,
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// `EnvFilter` directive for this verbosity.
    pub fn directive(&self) -> String {
        let engine_level = match self {
            Verbosity::Off => return "off".to_string(),
            Verbosity::KeyEvents => return "info".to_string(),
            Verbosity::Verbose => "debug",
            Verbosity::BarLevel => "trace",
        };
        let mut directive = String::from("info");
        for target in ENGINE_TARGETS {
            directive.push_str(&format!(",{target}={engine_level}"));
        }
        directive
    }
}

impl From<u8> for Verbosity {
    fn from(level: u8) -> Self {
        Self::from_level(level)
    }
}

impl From<Verbosity> for u8 {
    fn from(verbosity: Verbosity) -> Self {
        verbosity.level()
    }
}

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `filter` when set. With `file`, a copy of every event
/// is written there without ANSI colors; keep the returned guard alive until
/// exit so buffered lines are flushed.
pub fn setup_logging(filter: &str, format: LogFormat, file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (file_layer, guard) = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| OsStr::new("stratum.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
    guard
}
