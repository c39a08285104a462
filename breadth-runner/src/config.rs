//! Serializable run configuration.

use breadth_core::data::PlanStrategy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Unique identifier for a run (content-addressable hash of its config).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Serializable configuration for a single breadth run.
///
/// This captures everything needed to reproduce a run: the universe file,
/// acquisition strategy and lookback, rolling-window parameters, the
/// coverage gate, and the reporting window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Path to the universe TOML (triples of id/segment/kind). `None` uses
    /// the built-in sample universe.
    pub universe_file: Option<PathBuf>,

    /// Calendar days of history to request. Must comfortably exceed the
    /// rolling window in trading days (200 trading days ≈ 290 calendar days).
    pub lookback_days: i64,

    /// Acquisition strategy selection.
    pub strategy: StrategyConfig,

    /// Benchmark instrument to join onto the breadth rows, if any.
    pub benchmark: Option<String>,

    /// Rolling window length in trading days.
    pub window: usize,

    /// Observed days required before the window is defined.
    pub min_periods: usize,

    /// Coverage gate: minimum instrument columns the assembled matrix must
    /// have before the engine runs.
    pub min_instruments: usize,

    /// Trailing rows shown in the report view.
    pub report_days: usize,

    /// Output directory for report artifacts.
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            universe_file: None,
            lookback_days: 365,
            strategy: StrategyConfig::default(),
            benchmark: Some("TAIEX".to_string()),
            window: 200,
            min_periods: 150,
            min_instruments: 100,
            report_days: 10,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Deterministic hash ID for this configuration. Two runs with identical
    /// configs share the same RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Acquisition window `[start, end]` for a run dated `as_of`.
    pub fn acquisition_window(&self, as_of: NaiveDate) -> (NaiveDate, NaiveDate) {
        (as_of - chrono::Duration::days(self.lookback_days), as_of)
    }
}

/// Acquisition strategy selection (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// Per-instrument requests in fixed-size batches.
    InstrumentBatches {
        batch_size: usize,
        cooldown_secs: u64,
        #[serde(default)]
        parallel: bool,
    },

    /// One whole-market request per calendar month.
    MarketMonths { delay_ms: u64 },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        // Preferred: request count independent of universe size.
        Self::MarketMonths { delay_ms: 1500 }
    }
}

impl StrategyConfig {
    pub fn to_plan(&self) -> PlanStrategy {
        match *self {
            StrategyConfig::InstrumentBatches {
                batch_size,
                cooldown_secs,
                parallel,
            } => PlanStrategy::InstrumentBatches {
                batch_size,
                cooldown: Duration::from_secs(cooldown_secs),
                parallel,
            },
            StrategyConfig::MarketMonths { delay_ms } => PlanStrategy::MarketMonths {
                delay: Duration::from_millis(delay_ms),
            },
        }
    }
}
