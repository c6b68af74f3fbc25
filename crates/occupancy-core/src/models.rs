//! Tables and records flowing through the occupancy pipeline.
//!
//! Every stage takes a borrowed snapshot of the previous stage's table and
//! returns a new owned one; nothing here is mutated in place by the pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OccupancyError, Result};
use crate::settings::ColumnAliases;

// ── CellValue ─────────────────────────────────────────────────────────────────

/// One untyped cell of an ingested table.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Convert a scalar JSON value into a cell.  Nested arrays and objects
    /// are not cells.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(CellValue::Null),
            Value::Bool(b) => Ok(CellValue::Text(b.to_string())),
            Value::Number(n) => n.as_f64().map(CellValue::Number).ok_or_else(|| {
                OccupancyError::TypeMismatch(format!("number {} is not representable", n))
            }),
            Value::String(s) => Ok(CellValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(OccupancyError::TypeMismatch(
                "cells must be scalars, found a nested array or object".to_string(),
            )),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
        }
    }

    /// String form used for identifiers and equality filters.
    ///
    /// Integral numbers render without a fractional part so that a numeric
    /// sensor id `42` and the text `"42"` compare equal.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            CellValue::Number(n) => n.to_string(),
        }
    }
}

// ── RawTable ──────────────────────────────────────────────────────────────────

/// A rectangular table of untyped cells with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Build a table, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(OccupancyError::TypeMismatch(format!(
                "row {} has {} cells, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from one of three JSON shapes:
    ///
    /// * column map: `{"col": [v, ...], ...}`
    /// * list of row objects: `[{"col": v, ...}, ...]`
    /// * row-list: `[[v, v, v], ...]` with positional columns `"0"`, `"1"`, ...
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => {
                let mut columns = Vec::with_capacity(map.len());
                let mut data: Vec<&Vec<Value>> = Vec::with_capacity(map.len());
                for (name, col) in map {
                    let Value::Array(cells) = col else {
                        return Err(OccupancyError::TypeMismatch(format!(
                            "column '{}' is not a list",
                            name
                        )));
                    };
                    columns.push(name.clone());
                    data.push(cells);
                }
                let height = data.first().map(|c| c.len()).unwrap_or(0);
                if data.iter().any(|c| c.len() != height) {
                    return Err(OccupancyError::TypeMismatch(
                        "columns have different lengths".to_string(),
                    ));
                }
                let mut rows = Vec::with_capacity(height);
                for i in 0..height {
                    let row = data
                        .iter()
                        .map(|col| CellValue::from_json(&col[i]))
                        .collect::<Result<Vec<_>>>()?;
                    rows.push(row);
                }
                Self::new(columns, rows)
            }
            Value::Array(items) if items.is_empty() => Ok(Self::default()),
            Value::Array(items) => match &items[0] {
                Value::Object(_) => Self::from_row_objects(items),
                Value::Array(_) => Self::from_row_list(items),
                _ => Err(OccupancyError::TypeMismatch(
                    "a list input must contain row objects or row lists".to_string(),
                )),
            },
            other => Err(OccupancyError::TypeMismatch(format!(
                "expected a table, found {}",
                json_kind(other)
            ))),
        }
    }

    fn from_row_objects(items: &[Value]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for item in items {
            let Value::Object(obj) = item else {
                return Err(OccupancyError::TypeMismatch(format!(
                    "mixed row shapes: expected object, found {}",
                    json_kind(item)
                )));
            };
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            if let Value::Object(obj) = item {
                let row = columns
                    .iter()
                    .map(|c| obj.get(c).map_or(Ok(CellValue::Null), CellValue::from_json))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(row);
            }
        }
        Self::new(columns, rows)
    }

    fn from_row_list(items: &[Value]) -> Result<Self> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let Value::Array(cells) = item else {
                return Err(OccupancyError::TypeMismatch(format!(
                    "mixed row shapes: expected list, found {}",
                    json_kind(item)
                )));
            };
            rows.push(
                cells
                    .iter()
                    .map(CellValue::from_json)
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let columns = (0..width).map(|i| i.to_string()).collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// `true` when all three logical columns resolve through `aliases`.
    pub fn is_counter_table(&self, aliases: &ColumnAliases) -> bool {
        [&aliases.timestamp, &aliases.counter, &aliases.sensor_id]
            .iter()
            .all(|alias| self.column_index(alias).is_some())
    }

    /// Rows whose `column` cell renders as `value`.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<RawTable> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| OccupancyError::Schema {
                logical: "sensor_id",
                alias: column.to_string(),
            })?;
        let rows = self
            .rows
            .iter()
            .filter(|r| r[idx].to_text() == value)
            .cloned()
            .collect();
        Ok(RawTable {
            columns: self.columns.clone(),
            rows,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// ── Pipeline records ──────────────────────────────────────────────────────────

/// A normalised reading.  The counter is `None` when the source cell was empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub sensor_id: String,
    pub timestamp: DateTime<Tz>,
    pub counter_value: Option<f64>,
}

/// A reading assigned to a monotonic-intent segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedRecord {
    pub sensor_id: String,
    pub timestamp: DateTime<Tz>,
    pub counter_value: f64,
    pub segment_id: u32,
}

/// A segmented reading further assigned to a calendar reset interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedRecord {
    pub record: SegmentedRecord,
    pub interval_id: u32,
}

impl PartitionedRecord {
    /// `(segment_id, interval_id)`: delta computation never crosses this key.
    pub fn partition_key(&self) -> (u32, u32) {
        (self.record.segment_id, self.interval_id)
    }
}

/// Per-reading increment against the previous reading of its partition.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRecord {
    pub sensor_id: String,
    pub timestamp: DateTime<Tz>,
    pub segment_id: u32,
    pub interval_id: u32,
    pub delta: f64,
}

// ── Buckets ───────────────────────────────────────────────────────────────────

/// Start of a fixed-width aggregation window in the canonical zone.
///
/// Field order gives the ascending `(date, hour, minute)` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
}

impl BucketKey {
    /// Floor a local wall-clock time to a window of `width_minutes`, aligned
    /// on local midnight.  A zero width is treated as one minute.
    pub fn floor(local: NaiveDateTime, width_minutes: u32) -> Self {
        let width = width_minutes.max(1);
        let minute_of_day = local.hour() * 60 + local.minute();
        let start = minute_of_day - minute_of_day % width;
        Self {
            date: local.date(),
            hour: start / 60,
            minute: start % 60,
        }
    }

    /// Hourly key `(date, hour)`.
    pub fn hourly(date: NaiveDate, hour: u32) -> Self {
        Self {
            date,
            hour,
            minute: 0,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date
            .and_hms_opt(self.hour, self.minute, 0)
            .unwrap_or_else(|| self.date.and_time(chrono::NaiveTime::MIN))
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}:{:02}", self.date, self.hour, self.minute)
    }
}

/// Summed increments for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub delta_sum: f64,
}

/// Buckets of one sensor or merged lane group, ascending by key, at most one
/// row per key.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketTable {
    pub label: String,
    pub buckets: Vec<Bucket>,
}

impl BucketTable {
    pub fn get(&self, key: &BucketKey) -> Option<f64> {
        self.buckets
            .binary_search_by(|b| b.key.cmp(key))
            .ok()
            .map(|i| self.buckets[i].delta_sum)
    }

    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|b| b.delta_sum).sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// ── OccupancyRecord ───────────────────────────────────────────────────────────

/// One row of the final occupancy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    #[serde(flatten)]
    pub bucket: BucketKey,
    #[serde(rename = "in")]
    pub in_count: f64,
    #[serde(rename = "out")]
    pub out_count: f64,
    pub delta: f64,
    /// Estimated vehicles present at the end of the bucket.  May be negative.
    pub cumulative: f64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
