//! Per-reading increments within `(segment_id, interval_id)` partitions.

use std::collections::BTreeMap;

use occupancy_core::models::{DeltaRecord, PartitionedRecord};

/// Compute the increment of every reading against the previous reading of
/// its partition.
///
/// Without interval partitioning the first reading of a partition counts
/// against an implicit zero, so it carries its full counter value.  With
/// partitioning the baseline restarts at the partition's first reading,
/// whose delta is therefore 0.
///
/// Partitions are emitted in `(segment_id, interval_id)` order, readings
/// within a partition in input (timestamp) order.
pub fn compute_deltas(records: &[PartitionedRecord], intervals_enabled: bool) -> Vec<DeltaRecord> {
    let mut partitions: BTreeMap<(u32, u32), Vec<&PartitionedRecord>> = BTreeMap::new();
    for record in records {
        partitions
            .entry(record.partition_key())
            .or_default()
            .push(record);
    }

    let mut deltas = Vec::with_capacity(records.len());
    for ((segment_id, interval_id), members) in partitions {
        let baseline = if intervals_enabled {
            members.first().map_or(0.0, |r| r.record.counter_value)
        } else {
            0.0
        };

        let mut previous = baseline;
        for member in members {
            let value = member.record.counter_value;
            deltas.push(DeltaRecord {
                sensor_id: member.record.sensor_id.clone(),
                timestamp: member.record.timestamp,
                segment_id,
                interval_id,
                delta: value - previous,
            });
            previous = value;
        }
    }

    deltas
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;
    use occupancy_core::models::SegmentedRecord;

    fn partitioned(values: &[(f64, u32, u32)]) -> Vec<PartitionedRecord> {
        let t0 = Tz::UTC.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &(value, segment_id, interval_id))| PartitionedRecord {
                record: SegmentedRecord {
                    sensor_id: "A".to_string(),
                    timestamp: t0 + Duration::hours(i as i64),
                    counter_value: value,
                    segment_id,
                },
                interval_id,
            })
            .collect()
    }

    fn delta_values(deltas: &[DeltaRecord]) -> Vec<f64> {
        deltas.iter().map(|d| d.delta).collect()
    }

    #[test]
    fn test_zero_baseline_without_intervals() {
        let records = partitioned(&[(5.0, 0, 0), (8.0, 0, 0), (12.0, 0, 0), (3.0, 1, 0), (7.0, 1, 0)]);
        let deltas = compute_deltas(&records, false);
        assert_eq!(delta_values(&deltas), vec![5.0, 3.0, 4.0, 3.0, 4.0]);
    }

    #[test]
    fn test_first_reading_baseline_with_intervals() {
        let records = partitioned(&[(100.0, 0, 0), (104.0, 0, 0), (110.0, 0, 1), (115.0, 0, 1)]);
        let deltas = compute_deltas(&records, true);
        assert_eq!(delta_values(&deltas), vec![0.0, 4.0, 0.0, 5.0]);
    }

    #[test]
    fn test_partitions_never_share_a_baseline() {
        let records = partitioned(&[(50.0, 0, 0), (60.0, 0, 1), (61.0, 0, 1)]);
        let deltas = compute_deltas(&records, true);
        // 60 is not differenced against 50.
        assert_eq!(deltas[1].delta, 0.0);
        assert_eq!(deltas[2].delta, 1.0);
    }

    #[test]
    fn test_deltas_carry_partition_ids() {
        let records = partitioned(&[(1.0, 0, 0), (2.0, 1, 3)]);
        let deltas = compute_deltas(&records, true);
        assert_eq!((deltas[0].segment_id, deltas[0].interval_id), (0, 0));
        assert_eq!((deltas[1].segment_id, deltas[1].interval_id), (1, 3));
    }

    #[test]
    fn test_deltas_are_non_negative_for_monotonic_partitions() {
        let records = partitioned(&[(0.0, 0, 0), (0.0, 0, 0), (3.0, 0, 0), (1.0, 1, 0), (9.0, 1, 0)]);
        for intervals in [false, true] {
            assert!(compute_deltas(&records, intervals).iter().all(|d| d.delta >= 0.0));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_deltas(&[], false).is_empty());
    }
}
