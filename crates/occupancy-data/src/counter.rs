//! Per-sensor counter series and the reconciliation chain
//! reset detection → glitch filter → intervals → deltas → buckets.

use std::collections::BTreeMap;

use occupancy_core::error::Result;
use occupancy_core::models::{BucketTable, DeltaRecord, RawRecord, RawTable};
use occupancy_core::settings::{ColumnAliases, PipelineConfig};
use occupancy_core::time_utils::TimezoneHandler;
use serde::Serialize;
use tracing::info;

use crate::bucket::bucket_deltas;
use crate::delta::compute_deltas;
use crate::normalizer::normalize;
use crate::partition::{assign_intervals, count_partitions};
use crate::reset::{count_resets, detect_resets, filter_glitches, single_segment};

// ── ReconcileStats ────────────────────────────────────────────────────────────

/// Data-quality figures collected while reconciling one series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub records_in: usize,
    pub missing_counter: usize,
    pub resets_detected: u32,
    pub glitches_removed: usize,
    pub partitions: usize,
    pub records_out: usize,
}

impl ReconcileStats {
    pub fn segments(&self) -> u32 {
        self.resets_detected + 1
    }
}

// ── CounterSeries ─────────────────────────────────────────────────────────────

/// All normalised readings of one sensor.
#[derive(Debug, Clone)]
pub struct CounterSeries {
    pub sensor_id: String,
    pub records: Vec<RawRecord>,
}

impl CounterSeries {
    /// Normalise `table` and split it into one series per sensor id, sorted
    /// by sensor id.
    pub fn from_table(
        table: &RawTable,
        aliases: &ColumnAliases,
        tz: &TimezoneHandler,
    ) -> Result<Vec<CounterSeries>> {
        let mut by_sensor: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
        for record in normalize(table, aliases, tz)? {
            by_sensor
                .entry(record.sensor_id.clone())
                .or_default()
                .push(record);
        }
        Ok(by_sensor
            .into_iter()
            .map(|(sensor_id, records)| CounterSeries { sensor_id, records })
            .collect())
    }

    /// Reconstruct per-reading increments.
    pub fn deltas(&self, config: &PipelineConfig) -> (Vec<DeltaRecord>, ReconcileStats) {
        let mut stats = ReconcileStats {
            records_in: self.records.len(),
            missing_counter: self
                .records
                .iter()
                .filter(|r| r.counter_value.is_none())
                .count(),
            ..Default::default()
        };

        let segmented = if config.clean {
            let segmented = detect_resets(&self.records, config.reset_threshold);
            stats.resets_detected = count_resets(&segmented);
            let filtered = filter_glitches(&segmented);
            stats.glitches_removed = segmented.len() - filtered.len();
            filtered
        } else {
            single_segment(&self.records)
        };

        let partitioned = assign_intervals(&segmented, config.reset_interval_days);
        stats.partitions = count_partitions(&partitioned);

        let deltas = compute_deltas(&partitioned, config.reset_interval_days > 0);
        stats.records_out = deltas.len();

        info!(
            "Sensor {}: {} readings in, {} deltas out ({} resets, {} glitches, {} partitions)",
            self.sensor_id,
            stats.records_in,
            stats.records_out,
            stats.resets_detected,
            stats.glitches_removed,
            stats.partitions
        );

        (deltas, stats)
    }

    /// Bucketed increments, labelled with `label`.
    pub fn counts(&self, label: &str, config: &PipelineConfig) -> (BucketTable, ReconcileStats) {
        let (deltas, stats) = self.deltas(config);
        (
            bucket_deltas(label, &deltas, config.bucket_width_minutes),
            stats,
        )
    }

    /// Hourly increments regardless of the configured width.
    pub fn hour_counts(&self, config: &PipelineConfig) -> (BucketTable, ReconcileStats) {
        let hourly = PipelineConfig {
            bucket_width_minutes: 60,
            ..config.clone()
        };
        self.counts(&self.sensor_id, &hourly)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
