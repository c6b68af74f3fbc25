//! Resampling of per-reading increments into fixed-width time buckets.

use std::collections::BTreeMap;

use occupancy_core::models::{Bucket, BucketKey, BucketTable, DeltaRecord};
use tracing::debug;

/// Sum `deltas` into windows of `width_minutes` aligned on local midnight of
/// the records' zone.
///
/// Only buckets with at least one contributing reading are emitted; empty
/// windows are not zero-filled.
pub fn bucket_deltas(label: &str, deltas: &[DeltaRecord], width_minutes: u32) -> BucketTable {
    // BTreeMap keeps the buckets sorted by (date, hour, minute).
    let mut sums: BTreeMap<BucketKey, f64> = BTreeMap::new();
    for record in deltas {
        let key = BucketKey::floor(record.timestamp.naive_local(), width_minutes);
        *sums.entry(key).or_insert(0.0) += record.delta;
    }

    debug!(
        "{}: {} readings into {} buckets of {} min",
        label,
        deltas.len(),
        sums.len(),
        width_minutes
    );

    BucketTable {
        label: label.to_string(),
        buckets: sums
            .into_iter()
            .map(|(key, delta_sum)| Bucket { key, delta_sum })
            .collect(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Tz;

    fn delta_at(tz: Tz, h: u32, m: u32, delta: f64) -> DeltaRecord {
        DeltaRecord {
            sensor_id: "A".to_string(),
            timestamp: tz.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap(),
            segment_id: 0,
            interval_id: 0,
            delta,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_hourly_sums() {
        let deltas = vec![
            delta_at(Tz::UTC, 9, 5, 1.0),
            delta_at(Tz::UTC, 9, 55, 2.0),
            delta_at(Tz::UTC, 10, 0, 4.0),
        ];
        let table = bucket_deltas("A", &deltas, 60);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&BucketKey::hourly(day(), 9)), Some(3.0));
        assert_eq!(table.get(&BucketKey::hourly(day(), 10)), Some(4.0));
    }

    #[test]
    fn test_no_zero_filling() {
        let deltas = vec![delta_at(Tz::UTC, 8, 0, 1.0), delta_at(Tz::UTC, 12, 0, 1.0)];
        let table = bucket_deltas("A", &deltas, 60);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&BucketKey::hourly(day(), 10)), None);
    }

    #[test]
    fn test_quarter_hour_buckets() {
        let deltas = vec![
            delta_at(Tz::UTC, 9, 0, 1.0),
            delta_at(Tz::UTC, 9, 14, 1.0),
            delta_at(Tz::UTC, 9, 15, 5.0),
        ];
        let table = bucket_deltas("A", &deltas, 15);
        assert_eq!(table.len(), 2);
        assert_eq!(table.buckets[0].delta_sum, 2.0);
        assert_eq!((table.buckets[1].key.hour, table.buckets[1].key.minute), (9, 15));
    }

    #[test]
    fn test_buckets_use_local_hour_of_zone() {
        let paris: Tz = "Europe/Paris".parse().unwrap();
        let deltas = vec![delta_at(paris, 9, 30, 2.0)];
        let table = bucket_deltas("A", &deltas, 60);
        assert_eq!(table.buckets[0].key, BucketKey::hourly(day(), 9));
    }

    #[test]
    fn test_buckets_sorted_ascending() {
        let deltas = vec![delta_at(Tz::UTC, 14, 0, 1.0), delta_at(Tz::UTC, 7, 0, 1.0)];
        let table = bucket_deltas("A", &deltas, 60);
        assert!(table.buckets[0].key < table.buckets[1].key);
        assert_eq!(table.total(), 2.0);
    }
}
