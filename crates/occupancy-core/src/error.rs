use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the occupancy pipeline.
#[derive(Error, Debug)]
pub enum OccupancyError {
    /// A required logical column is absent after alias resolution.
    #[error("Missing required column '{logical}' (looked for '{alias}')")]
    Schema { logical: &'static str, alias: String },

    /// The input is not a column map, a list of row objects or a row-list.
    #[error("Incompatible input shape: {0}")]
    TypeMismatch(String),

    /// An inner join produced no rows.
    #[error("No overlapping buckets in {0}")]
    DisjointRange(String),

    /// A timestamp cell could not be coerced to an instant.
    #[error("Invalid timestamp at row {row}: {value:?}")]
    TimestampParse { row: usize, value: String },

    /// A non-empty counter cell could not be coerced to a float.
    #[error("Invalid counter value at row {row}: {value:?}")]
    CounterParse { row: usize, value: String },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// A stage that needs at least one input table received none.
    #[error("No inputs supplied to {0}")]
    NoInputs(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited text could not be decoded.
    #[error("Failed to parse CSV: {0}")]
    Csv(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl OccupancyError {
    /// `true` for conditions a caller may treat as "no data" instead of a
    /// failed run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OccupancyError::DisjointRange(_))
    }
}

/// Convenience alias used throughout the occupancy crates.
pub type Result<T> = std::result::Result<T, OccupancyError>;
