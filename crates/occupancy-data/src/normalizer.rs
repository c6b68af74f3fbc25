//! Record normalisation: resolves column aliases and coerces the three
//! logical fields of every row.
//!
//! No row is dropped here.  An empty counter cell becomes `None` and is
//! discarded later by reset detection; a malformed non-empty cell fails the
//! run.

use occupancy_core::error::{OccupancyError, Result};
use occupancy_core::models::{CellValue, RawRecord, RawTable};
use occupancy_core::settings::ColumnAliases;
use occupancy_core::time_utils::TimezoneHandler;
use tracing::debug;

/// Coerce every row of `table` into a [`RawRecord`].
pub fn normalize(
    table: &RawTable,
    aliases: &ColumnAliases,
    tz: &TimezoneHandler,
) -> Result<Vec<RawRecord>> {
    let ts_idx = resolve(table, "timestamp", &aliases.timestamp)?;
    let counter_idx = resolve(table, "counter", &aliases.counter)?;
    let id_idx = resolve(table, "sensor_id", &aliases.sensor_id)?;

    let mut records = Vec::with_capacity(table.len());
    let mut missing = 0usize;

    for (row_no, row) in table.rows().iter().enumerate() {
        let timestamp = coerce_timestamp(&row[ts_idx], tz).ok_or_else(|| {
            OccupancyError::TimestampParse {
                row: row_no,
                value: row[ts_idx].to_text(),
            }
        })?;
        let counter_value = coerce_counter(&row[counter_idx], row_no)?;
        if counter_value.is_none() {
            missing += 1;
        }

        records.push(RawRecord {
            sensor_id: row[id_idx].to_text().trim().to_string(),
            timestamp,
            counter_value,
        });
    }

    debug!(
        "Normalised {} rows ({} without a counter value) using columns {}/{}/{}, zone {} (naive input as {})",
        records.len(),
        missing,
        aliases.timestamp,
        aliases.counter,
        aliases.sensor_id,
        tz.canonical(),
        tz.source()
    );

    Ok(records)
}

fn resolve(table: &RawTable, logical: &'static str, alias: &str) -> Result<usize> {
    table
        .column_index(alias)
        .ok_or_else(|| OccupancyError::Schema {
            logical,
            alias: alias.to_string(),
        })
}

fn coerce_timestamp(
    cell: &CellValue,
    tz: &TimezoneHandler,
) -> Option<chrono::DateTime<chrono_tz::Tz>> {
    match cell {
        CellValue::Null => None,
        CellValue::Number(secs) => tz.parse_epoch_seconds(*secs),
        CellValue::Text(s) => tz.parse_timestamp(s).or_else(|| {
            // Delimited input keeps cells as text; unix time arrives this way.
            s.trim()
                .parse::<f64>()
                .ok()
                .and_then(|secs| tz.parse_epoch_seconds(secs))
        }),
    }
}

fn coerce_counter(cell: &CellValue, row: usize) -> Result<Option<f64>> {
    if cell.is_null() {
        return Ok(None);
    }
    let value = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().parse::<f64>().map_err(|_| OccupancyError::CounterParse {
            row,
            value: s.clone(),
        })?,
        CellValue::Null => return Ok(None),
    };
    if value.is_nan() {
        return Ok(None);
    }
    if value.is_infinite() {
        return Err(OccupancyError::CounterParse {
            row,
            value: cell.to_text(),
        });
    }
    Ok(Some(value))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
