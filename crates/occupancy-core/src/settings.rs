use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OccupancyError, Result};
use crate::time_utils::{validate_timezone, TimezoneHandler};

// ── ColumnAliases ──────────────────────────────────────────────────────────────

/// Source column names for the three logical fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub timestamp: String,
    pub counter: String,
    pub sensor_id: String,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            counter: "counter".to_string(),
            sensor_id: "uuid".to_string(),
        }
    }
}

impl ColumnAliases {
    /// Same aliases with the counter read from another column.
    pub fn with_counter(&self, counter: &str) -> Self {
        Self {
            counter: counter.to_string(),
            ..self.clone()
        }
    }
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Explicit configuration passed through every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// A drop to a value at or below this threshold is a device reset.
    pub reset_threshold: f64,
    /// Length of the delta-baseline epochs in days; 0 disables them.
    pub reset_interval_days: u32,
    /// Aggregation window; must divide a day evenly.
    pub bucket_width_minutes: u32,
    /// Canonical zone for every timestamp (`"auto"` = system zone).
    pub timezone: String,
    /// Zone used to localise naive timestamps; defaults to `timezone`.
    pub source_timezone: Option<String>,
    /// Run reset detection and glitch filtering before computing deltas.
    pub clean: bool,
    /// Restart the occupancy running sum every N days; 0 keeps one sum.
    pub occupancy_reset_interval_days: u32,
    pub columns: ColumnAliases,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reset_threshold: 10.0,
            reset_interval_days: 0,
            bucket_width_minutes: 60,
            timezone: "UTC".to_string(),
            source_timezone: None,
            clean: true,
            occupancy_reset_interval_days: 0,
            columns: ColumnAliases::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file.  Missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| OccupancyError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.reset_threshold.is_finite() || self.reset_threshold < 0.0 {
            return Err(OccupancyError::InvalidConfig(format!(
                "reset_threshold must be a finite, non-negative number (got {})",
                self.reset_threshold
            )));
        }
        if self.bucket_width_minutes == 0 || 1440 % self.bucket_width_minutes != 0 {
            return Err(OccupancyError::InvalidConfig(format!(
                "bucket_width_minutes must divide a day evenly (got {})",
                self.bucket_width_minutes
            )));
        }
        if !validate_timezone(&self.timezone) {
            return Err(OccupancyError::InvalidConfig(format!(
                "unknown timezone \"{}\"",
                self.timezone
            )));
        }
        if let Some(src) = &self.source_timezone {
            if !validate_timezone(src) {
                return Err(OccupancyError::InvalidConfig(format!(
                    "unknown source timezone \"{}\"",
                    src
                )));
            }
        }
        Ok(())
    }

    pub fn timezone_handler(&self) -> Result<TimezoneHandler> {
        TimezoneHandler::new(&self.timezone, self.source_timezone.as_deref())
    }
}

// ── Lane ───────────────────────────────────────────────────────────────────────

/// One counting lane: a sensor id and, optionally, the counter column to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub sensor_id: String,
    pub counter_column: Option<String>,
}

impl std::str::FromStr for Lane {
    type Err = String;

    /// `SENSOR` or `SENSOR:COLUMN`; the column follows the last `:`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (sensor, column) = match s.rsplit_once(':') {
            Some((sensor, column)) => (sensor, Some(column)),
            None => (s, None),
        };
        if sensor.is_empty() {
            return Err(format!("lane \"{}\" has an empty sensor id", s));
        }
        if column.is_some_and(str::is_empty) {
            return Err(format!("lane \"{}\" has an empty counter column", s));
        }
        Ok(Lane {
            sensor_id: sensor.to_string(),
            counter_column: column.map(str::to_string),
        })
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.counter_column {
            Some(col) => write!(f, "{}:{}", self.sensor_id, col),
            None => write!(f, "{}", self.sensor_id),
        }
    }
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Estimate parking-lot occupancy from entry/exit event counters
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lot-occupancy",
    about = "Estimate parking-lot occupancy from entry/exit event counters",
    version
)]
pub struct Settings {
    /// Input table (.csv or .json)
    pub input: PathBuf,

    /// Entry lane, SENSOR or SENSOR:COUNTER_COLUMN (repeatable)
    #[arg(long = "in", value_name = "LANE", required = true)]
    pub in_lanes: Vec<Lane>,

    /// Exit lane, SENSOR or SENSOR:COUNTER_COLUMN (repeatable)
    #[arg(long = "out", value_name = "LANE", required = true)]
    pub out_lanes: Vec<Lane>,

    /// JSON pipeline configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// CSV field delimiter
    #[arg(long, default_value = ",")]
    pub delimiter: char,

    /// Source column holding the timestamp
    #[arg(long, default_value = "timestamp")]
    pub timestamp_column: String,

    /// Source column holding the counter (lanes may override it)
    #[arg(long, default_value = "counter")]
    pub counter_column: String,

    /// Source column holding the sensor id
    #[arg(long, default_value = "uuid")]
    pub id_column: String,

    /// Post-drop value at or below which a drop counts as a device reset
    #[arg(long, default_value = "10")]
    pub reset_threshold: f64,

    /// Restart the delta baseline every N days (0 = never)
    #[arg(long, default_value = "0")]
    pub reset_interval_days: u32,

    /// Bucket width in minutes
    #[arg(long, default_value = "60")]
    pub bucket_minutes: u32,

    /// Canonical timezone ("auto" = system timezone)
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Timezone of naive input timestamps (defaults to --timezone)
    #[arg(long)]
    pub source_timezone: Option<String>,

    /// Skip reset detection and glitch filtering
    #[arg(long)]
    pub no_clean: bool,

    /// Restart the occupancy running sum every N days (0 = never)
    #[arg(long, default_value = "0")]
    pub occupancy_reset_days: u32,

    /// Report format
    #[arg(long, default_value = "table", value_parser = ["table", "csv", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse process arguments; exits with clap's usage output on error.
    pub fn load() -> Result<(Self, PipelineConfig)> {
        let matches = Settings::command().get_matches_from(std::env::args_os());
        Self::from_matches(&matches)
    }

    /// Same as [`Settings::load`] but accepts an explicit argument list and
    /// reports argument errors instead of exiting.
    pub fn load_from_args<I, T>(args: I) -> Result<(Self, PipelineConfig)>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Settings::command()
            .try_get_matches_from(args)
            .map_err(|e| OccupancyError::InvalidConfig(e.to_string()))?;
        Self::from_matches(&matches)
    }

    /// Build the settings and the effective [`PipelineConfig`]: the config
    /// file (if any) provides the base, explicit command-line flags win.
    fn from_matches(matches: &clap::ArgMatches) -> Result<(Self, PipelineConfig)> {
        let mut settings = Settings::from_arg_matches(matches)
            .map_err(|e| OccupancyError::InvalidConfig(e.to_string()))?;

        let mut config = match &settings.config {
            Some(path) => PipelineConfig::load_from(path)?,
            None => PipelineConfig::default(),
        };
        let from_file = settings.config.is_some();

        // NOTE: clap stores the arg id using the *field name* (underscores).
        let take = |name: &str| !from_file || is_arg_explicitly_set(matches, name);

        if take("reset_threshold") {
            config.reset_threshold = settings.reset_threshold;
        }
        if take("reset_interval_days") {
            config.reset_interval_days = settings.reset_interval_days;
        }
        if take("bucket_minutes") {
            config.bucket_width_minutes = settings.bucket_minutes;
        }
        if take("timezone") {
            config.timezone = settings.timezone.clone();
        }
        if take("source_timezone") && settings.source_timezone.is_some() {
            config.source_timezone = settings.source_timezone.clone();
        }
        if take("no_clean") {
            config.clean = !settings.no_clean;
        }
        if take("occupancy_reset_days") {
            config.occupancy_reset_interval_days = settings.occupancy_reset_days;
        }
        if take("timestamp_column") {
            config.columns.timestamp = settings.timestamp_column.clone();
        }
        if take("counter_column") {
            config.columns.counter = settings.counter_column.clone();
        }
        if take("id_column") {
            config.columns.sensor_id = settings.id_column.clone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        config.validate()?;
        Ok((settings, config))
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
