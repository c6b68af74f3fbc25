//! Calendar reset intervals.
//!
//! The timeline is cut into fixed N-day windows anchored on the first
//! record's day of year.  The calendar year is part of each window label, so
//! a window never spans a year boundary.  Labels are remapped to consecutive
//! ids in first-seen order.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use occupancy_core::models::{PartitionedRecord, SegmentedRecord};
use tracing::debug;

/// Interval id for each date, in input order.
///
/// `interval_days == 0` disables partitioning and every date maps to 0.
pub fn interval_ids(dates: &[NaiveDate], interval_days: u32) -> Vec<u32> {
    let Some(first) = dates.first() else {
        return Vec::new();
    };
    if interval_days == 0 {
        return vec![0; dates.len()];
    }

    let anchor = i64::from(first.ordinal());
    let width = i64::from(interval_days);
    let mut seen: HashMap<(i32, i64), u32> = HashMap::new();

    dates
        .iter()
        .map(|d| {
            let epoch = (i64::from(d.ordinal()) - anchor).div_euclid(width);
            let next = seen.len() as u32;
            *seen.entry((d.year(), epoch)).or_insert(next)
        })
        .collect()
}

/// Attach an interval id to every record.  Records must already be in
/// timestamp order; the first one anchors the windows.
pub fn assign_intervals(records: &[SegmentedRecord], interval_days: u32) -> Vec<PartitionedRecord> {
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.timestamp.date_naive()).collect();
    let ids = interval_ids(&dates, interval_days);

    if interval_days > 0 {
        debug!(
            "Split {} records into {} intervals of {} days",
            records.len(),
            ids.iter().max().map_or(0, |m| m + 1),
            interval_days
        );
    }

    records
        .iter()
        .zip(ids)
        .map(|(record, interval_id)| PartitionedRecord {
            record: record.clone(),
            interval_id,
        })
        .collect()
}

/// Number of distinct `(segment_id, interval_id)` partitions.
pub fn count_partitions(records: &[PartitionedRecord]) -> usize {
    let mut keys: Vec<(u32, u32)> = records.iter().map(|r| r.partition_key()).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;

    fn daily(start: (i32, u32, u32), days: usize) -> Vec<SegmentedRecord> {
        let t0 = Tz::UTC
            .with_ymd_and_hms(start.0, start.1, start.2, 8, 0, 0)
            .unwrap();
        (0..days)
            .map(|i| SegmentedRecord {
                sensor_id: "A".to_string(),
                timestamp: t0 + Duration::days(i as i64),
                counter_value: i as f64,
                segment_id: 0,
            })
            .collect()
    }

    #[test]
    fn test_disabled_is_single_interval() {
        let parts = assign_intervals(&daily((2024, 3, 1), 20), 0);
        assert!(parts.iter().all(|p| p.interval_id == 0));
        assert_eq!(count_partitions(&parts), 1);
    }

    #[test]
    fn test_seven_day_windows_over_twenty_days() {
        let parts = assign_intervals(&daily((2024, 3, 1), 20), 7);
        let ids: Vec<u32> = parts.iter().map(|p| p.interval_id).collect();

        assert_eq!(count_partitions(&parts), 3);
        assert!(ids[..7].iter().all(|&i| i == 0));
        assert!(ids[7..14].iter().all(|&i| i == 1));
        assert!(ids[14..].iter().all(|&i| i == 2));
    }

    #[test]
    fn test_windows_are_anchored_on_first_record() {
        // Starting mid-week: the first window still holds 7 full days.
        let parts = assign_intervals(&daily((2024, 3, 4), 8), 7);
        let ids: Vec<u32> = parts.iter().map(|p| p.interval_id).collect();
        assert_eq!(ids, vec![0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_year_boundary_starts_new_interval() {
        // 2023-12-30 .. 2024-01-02 all fall in one 7-day span but cross a year.
        let parts = assign_intervals(&daily((2023, 12, 30), 4), 7);
        let ids: Vec<u32> = parts.iter().map(|p| p.interval_id).collect();
        assert_eq!(ids, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_partition_key_combines_segment_and_interval() {
        let mut records = daily((2024, 3, 1), 10);
        for r in records.iter_mut().skip(5) {
            r.segment_id = 1;
        }
        let parts = assign_intervals(&records, 7);
        // Segment 0: days 0-4 (interval 0); segment 1: days 5-6 (0) and 7-9 (1).
        assert_eq!(count_partitions(&parts), 3);
    }

    #[test]
    fn test_interval_ids_empty() {
        assert!(interval_ids(&[], 7).is_empty());
    }
}
