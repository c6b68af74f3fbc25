//! In/out alignment and the running occupancy estimate.

use std::collections::HashMap;

use chrono::NaiveDate;
use occupancy_core::error::{OccupancyError, Result};
use occupancy_core::models::{BucketTable, OccupancyRecord};
use tracing::{debug, warn};

use crate::partition::interval_ids;

/// Inner-join the merged entry and exit tables and accumulate
/// `delta = in - out` in ascending bucket order.
///
/// `reset_interval_days > 0` restarts the running sum at the first bucket of
/// each N-day window (same windowing as the delta partitioner).  The
/// cumulative value is never clamped: a negative estimate is reported as is.
pub fn estimate_occupancy(
    inflow: &BucketTable,
    outflow: &BucketTable,
    reset_interval_days: u32,
) -> Result<Vec<OccupancyRecord>> {
    let joined: Vec<(usize, f64)> = inflow
        .buckets
        .iter()
        .enumerate()
        .filter_map(|(i, b)| outflow.get(&b.key).map(|out| (i, out)))
        .collect();

    if joined.is_empty() {
        warn!(
            "No common bucket between '{}' ({}) and '{}' ({})",
            inflow.label,
            inflow.len(),
            outflow.label,
            outflow.len()
        );
        return Err(OccupancyError::DisjointRange(format!(
            "in/out join of '{}' and '{}'",
            inflow.label, outflow.label
        )));
    }

    let dates: Vec<NaiveDate> = joined
        .iter()
        .map(|&(i, _)| inflow.buckets[i].key.date())
        .collect();
    let intervals = interval_ids(&dates, reset_interval_days);

    let mut running: HashMap<u32, f64> = HashMap::new();
    let rows: Vec<OccupancyRecord> = joined
        .iter()
        .zip(intervals)
        .map(|(&(i, out_count), interval)| {
            let bucket = inflow.buckets[i];
            let delta = bucket.delta_sum - out_count;
            let cumulative = running.entry(interval).or_insert(0.0);
            *cumulative += delta;
            OccupancyRecord {
                bucket: bucket.key,
                in_count: bucket.delta_sum,
                out_count,
                delta,
                cumulative: *cumulative,
            }
        })
        .collect();

    let negative = rows.iter().filter(|r| r.cumulative < 0.0).count();
    if negative > 0 {
        warn!(
            "Occupancy estimate is negative in {} of {} buckets; exits exceed recorded entries",
            negative,
            rows.len()
        );
    }
    debug!(
        "Occupancy over {} buckets ({} in, {} out)",
        rows.len(),
        inflow.len(),
        outflow.len()
    );

    Ok(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use occupancy_core::models::{Bucket, BucketKey};

    fn table(label: &str, rows: &[(u32, u32, f64)]) -> BucketTable {
        BucketTable {
            label: label.to_string(),
            buckets: rows
                .iter()
                .map(|&(day, hour, delta_sum)| Bucket {
                    key: BucketKey::hourly(NaiveDate::from_ymd_opt(2024, 3, day).unwrap(), hour),
                    delta_sum,
                })
                .collect(),
        }
    }

    #[test]
    fn test_delta_and_cumulative() {
        let inflow = table("in", &[(1, 9, 7.0), (1, 10, 3.0)]);
        let outflow = table("out", &[(1, 9, 2.0), (1, 10, 6.0)]);
        let rows = estimate_occupancy(&inflow, &outflow, 0).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            (rows[0].in_count, rows[0].out_count, rows[0].delta, rows[0].cumulative),
            (7.0, 2.0, 5.0, 5.0)
        );
        assert_eq!(
            (rows[1].in_count, rows[1].out_count, rows[1].delta, rows[1].cumulative),
            (3.0, 6.0, -3.0, 2.0)
        );
    }

    #[test]
    fn test_only_overlapping_buckets_kept() {
        let inflow = table("in", &[(1, 8, 1.0), (1, 9, 7.0)]);
        let outflow = table("out", &[(1, 9, 2.0), (1, 11, 4.0)]);
        let rows = estimate_occupancy(&inflow, &outflow, 0).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bucket.hour(), 9);
    }

    #[test]
    fn test_cumulative_is_prefix_sum_of_delta() {
        let inflow = table("in", &[(1, 0, 4.0), (1, 5, 1.0), (2, 3, 0.0), (2, 9, 8.0)]);
        let outflow = table("out", &[(1, 0, 1.0), (1, 5, 6.0), (2, 3, 2.0), (2, 9, 3.0)]);
        let rows = estimate_occupancy(&inflow, &outflow, 0).unwrap();

        let mut sum = 0.0;
        for row in &rows {
            sum += row.delta;
            assert_eq!(row.cumulative, sum);
        }
        assert!(rows.windows(2).all(|w| w[0].bucket < w[1].bucket));
    }

    #[test]
    fn test_negative_occupancy_not_clamped() {
        let inflow = table("in", &[(1, 9, 0.0)]);
        let outflow = table("out", &[(1, 9, 4.0)]);
        let rows = estimate_occupancy(&inflow, &outflow, 0).unwrap();
        assert_eq!(rows[0].cumulative, -4.0);
    }

    #[test]
    fn test_disjoint_in_out_error() {
        let inflow = table("in", &[(1, 9, 1.0)]);
        let outflow = table("out", &[(2, 9, 1.0)]);
        let err = estimate_occupancy(&inflow, &outflow, 0).unwrap_err();
        assert!(matches!(err, OccupancyError::DisjointRange(_)));
    }

    #[test]
    fn test_reset_interval_restarts_running_sum() {
        // Days 1-2 fall in the first 2-day window, day 3 starts the next.
        let inflow = table("in", &[(1, 9, 5.0), (2, 9, 5.0), (3, 9, 5.0)]);
        let outflow = table("out", &[(1, 9, 1.0), (2, 9, 1.0), (3, 9, 1.0)]);
        let rows = estimate_occupancy(&inflow, &outflow, 2).unwrap();

        let cumulative: Vec<f64> = rows.iter().map(|r| r.cumulative).collect();
        assert_eq!(cumulative, vec![4.0, 8.0, 4.0]);
    }
}
