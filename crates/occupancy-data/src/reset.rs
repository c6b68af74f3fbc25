//! Counter reset detection and glitch filtering for a single sensor.
//!
//! A reset is a drop to a value at or below the configured threshold: the
//! hardware restarted near zero.  Any other drop is a glitch, and the later,
//! lower reading is discarded until each segment is non-decreasing.

use occupancy_core::models::{RawRecord, SegmentedRecord};
use tracing::{debug, info, warn};

// ── Reset detection ───────────────────────────────────────────────────────────

/// Sort one sensor's readings by timestamp and split them into segments.
///
/// Readings without a counter value are dropped.  The segment id of a reading
/// is the number of resets observed up to and including it.
pub fn detect_resets(records: &[RawRecord], threshold: f64) -> Vec<SegmentedRecord> {
    let sorted = sorted_readings(records);

    let mut segmented = Vec::with_capacity(sorted.len());
    let mut segment_id = 0u32;
    let mut previous: Option<f64> = None;

    for (record, value) in sorted {
        if let Some(prev) = previous {
            if value - prev < 0.0 && value <= threshold {
                segment_id += 1;
            }
        }
        previous = Some(value);
        segmented.push(SegmentedRecord {
            sensor_id: record.sensor_id.clone(),
            timestamp: record.timestamp,
            counter_value: value,
            segment_id,
        });
    }

    let sensor = segmented
        .first()
        .map(|r| r.sensor_id.as_str())
        .unwrap_or("<empty>");
    if segment_id > 0 {
        info!(
            "Sensor {}: {} counter resets detected, {} segments",
            sensor,
            segment_id,
            segment_id + 1
        );
    } else {
        info!("Sensor {}: no counter resets detected", sensor);
    }

    segmented
}

/// Sort one sensor's readings and place them all in segment 0.
///
/// Used when cleaning is disabled; readings without a counter are still
/// dropped.
pub fn single_segment(records: &[RawRecord]) -> Vec<SegmentedRecord> {
    sorted_readings(records)
        .into_iter()
        .map(|(record, value)| SegmentedRecord {
            sensor_id: record.sensor_id.clone(),
            timestamp: record.timestamp,
            counter_value: value,
            segment_id: 0,
        })
        .collect()
}

fn sorted_readings(records: &[RawRecord]) -> Vec<(&RawRecord, f64)> {
    let mut readings: Vec<(&RawRecord, f64)> = records
        .iter()
        .filter_map(|r| r.counter_value.map(|v| (r, v)))
        .collect();

    let dropped = records.len() - readings.len();
    if dropped > 0 {
        warn!("Dropped {} readings without a counter value", dropped);
    }

    // Stable: readings sharing a timestamp keep their input order.
    readings.sort_by_key(|(r, _)| r.timestamp);
    readings
}

/// Number of resets in an already segmented series.
pub fn count_resets(records: &[SegmentedRecord]) -> u32 {
    records.last().map(|r| r.segment_id).unwrap_or(0)
}

// ── Glitch filtering ──────────────────────────────────────────────────────────

/// Repeatedly drop readings lower than their predecessor within the same
/// segment until a full pass removes nothing.
///
/// Every offending reading of a pass is judged against the sequence as it
/// stood at the start of that pass.  Input order is preserved.
pub fn filter_glitches(records: &[SegmentedRecord]) -> Vec<SegmentedRecord> {
    let mut kept: Vec<&SegmentedRecord> = records.iter().collect();
    let mut passes = 0usize;

    loop {
        let before = kept.len();
        let mut previous: Option<(u32, f64)> = None;
        kept.retain(|r| {
            let keep = match previous {
                Some((segment, value)) if segment == r.segment_id => r.counter_value >= value,
                _ => true,
            };
            previous = Some((r.segment_id, r.counter_value));
            keep
        });
        passes += 1;
        debug!("Glitch filter pass {}: removed {}", passes, before - kept.len());
        if kept.len() == before {
            break;
        }
    }

    let removed = records.len() - kept.len();
    if removed > 0 {
        info!(
            "Glitch filter discarded {} decreasing readings in {} passes",
            removed, passes
        );
    }

    kept.into_iter().cloned().collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
