//! End-to-end occupancy estimation from a shared sensor table.
//!
//! 1. Select each lane's rows by sensor id and normalise them with the lane's
//!    counter column.
//! 2. Reconcile and bucket every lane independently.
//! 3. Merge the entry lanes and the exit lanes.
//! 4. Join entries against exits and accumulate the occupancy estimate.

use occupancy_core::error::Result;
use occupancy_core::models::{BucketTable, OccupancyRecord, RawTable};
use occupancy_core::settings::{Lane, PipelineConfig};
use occupancy_core::time_utils::TimezoneHandler;
use serde::Serialize;
use tracing::{info, warn};

use crate::counter::{CounterSeries, ReconcileStats};
use crate::merge::merge_lanes;
use crate::occupancy::estimate_occupancy;

// ── Public types ──────────────────────────────────────────────────────────────

/// Reconciliation outcome of one lane.
#[derive(Debug, Clone, Serialize)]
pub struct LaneReport {
    pub lane: String,
    pub buckets: usize,
    pub total: f64,
    pub stats: ReconcileStats,
}

/// The complete output of [`estimate_from_table`].
#[derive(Debug, Clone, Serialize)]
pub struct OccupancyReport {
    pub rows: Vec<OccupancyRecord>,
    pub in_lanes: Vec<LaneReport>,
    pub out_lanes: Vec<LaneReport>,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Bucketed increments of one lane read from `table`.
///
/// A lane whose sensor has no rows yields an empty table; the merge or
/// in/out join downstream then reports the missing overlap.
pub fn lane_counts(
    table: &RawTable,
    lane: &Lane,
    config: &PipelineConfig,
    tz: &TimezoneHandler,
) -> Result<(BucketTable, LaneReport)> {
    let aliases = match &lane.counter_column {
        Some(col) => config.columns.with_counter(col),
        None => config.columns.clone(),
    };
    let rows = table.filter_eq(&aliases.sensor_id, &lane.sensor_id)?;
    if rows.is_empty() {
        warn!("Lane {}: no rows for sensor {}", lane, lane.sensor_id);
    }

    let label = lane.to_string();
    let (buckets, stats) = match CounterSeries::from_table(&rows, &aliases, tz)?.pop() {
        Some(series) => series.counts(&label, config),
        None => (
            BucketTable {
                label: label.clone(),
                buckets: Vec::new(),
            },
            ReconcileStats::default(),
        ),
    };

    let report = LaneReport {
        lane: label,
        buckets: buckets.len(),
        total: buckets.total(),
        stats,
    };
    Ok((buckets, report))
}

/// Run the full pipeline for the given entry and exit lanes.
pub fn estimate_from_table(
    table: &RawTable,
    in_lanes: &[Lane],
    out_lanes: &[Lane],
    config: &PipelineConfig,
) -> Result<OccupancyReport> {
    config.validate()?;
    let tz = config.timezone_handler()?;

    let (inflow, in_reports) = merged_group("in", table, in_lanes, config, &tz)?;
    let (outflow, out_reports) = merged_group("out", table, out_lanes, config, &tz)?;

    let rows = estimate_occupancy(&inflow, &outflow, config.occupancy_reset_interval_days)?;
    info!(
        "Estimated occupancy over {} buckets from {} entry and {} exit lanes",
        rows.len(),
        in_lanes.len(),
        out_lanes.len()
    );

    Ok(OccupancyReport {
        rows,
        in_lanes: in_reports,
        out_lanes: out_reports,
    })
}

fn merged_group(
    label: &str,
    table: &RawTable,
    lanes: &[Lane],
    config: &PipelineConfig,
    tz: &TimezoneHandler,
) -> Result<(BucketTable, Vec<LaneReport>)> {
    let mut tables = Vec::with_capacity(lanes.len());
    let mut reports = Vec::with_capacity(lanes.len());
    for lane in lanes {
        let (buckets, report) = lane_counts(table, lane, config, tz)?;
        tables.push(buckets);
        reports.push(report);
    }
    Ok((merge_lanes(label, &tables)?, reports))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
