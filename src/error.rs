use std::path::PathBuf;

use chrono::NaiveDate;

/// Errors raised while assembling or validating a [`SimulationConfig`].
///
/// [`SimulationConfig`]: crate::config::SimulationConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },

    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("unknown granularity '{0}' (expected daily, weekly or monthly)")]
    UnknownGranularity(String),

    #[error("unknown team '{0}' (expected finance, product or marketing)")]
    UnknownTeam(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while writing CSV or NDJSON output.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
