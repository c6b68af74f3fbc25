//! Additive merge of equivalent counting lanes.

use occupancy_core::error::{OccupancyError, Result};
use occupancy_core::models::{Bucket, BucketTable};
use tracing::{debug, warn};

/// Inner-join `tables` on their bucket keys and sum the per-lane values.
///
/// A bucket is kept only when every lane observed it.  An empty join is a
/// [`OccupancyError::DisjointRange`].
pub fn merge_lanes(label: &str, tables: &[BucketTable]) -> Result<BucketTable> {
    let Some((first, rest)) = tables.split_first() else {
        return Err(OccupancyError::NoInputs(format!("lane merge '{}'", label)));
    };

    let buckets: Vec<Bucket> = first
        .buckets
        .iter()
        .filter_map(|bucket| {
            rest.iter()
                .map(|t| t.get(&bucket.key))
                .sum::<Option<f64>>()
                .map(|others| Bucket {
                    key: bucket.key,
                    delta_sum: bucket.delta_sum + others,
                })
        })
        .collect();

    let dropped = first.len() - buckets.len();
    if dropped > 0 {
        debug!(
            "{}: {} buckets missing from at least one lane were excluded",
            label, dropped
        );
    }

    if buckets.is_empty() {
        let names: Vec<&str> = tables.iter().map(|t| t.label.as_str()).collect();
        warn!("{}: lanes share no bucket ({})", label, names.join(", "));
        return Err(OccupancyError::DisjointRange(format!(
            "merge of {} lanes [{}]",
            label,
            names.join(", ")
        )));
    }

    Ok(BucketTable {
        label: label.to_string(),
        buckets,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
