//! Rendering of an [`OccupancyReport`] as a text table, CSV or JSON.

use std::io::Write;

use occupancy_data::pipeline::{LaneReport, OccupancyReport};

// ── Summary statistics ─────────────────────────────────────────────────────────

/// Count / mean / min / max of one output column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnSummary {
    count: usize,
    mean: f64,
    min: f64,
    max: f64,
}

fn summarize(values: impl Iterator<Item = f64>) -> Option<ColumnSummary> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    (count > 0).then(|| ColumnSummary {
        count,
        mean: sum / count as f64,
        min,
        max,
    })
}

// ── Writers ────────────────────────────────────────────────────────────────────

/// Write `report` to `out` in `format` (`table`, `csv` or `json`).
pub fn write_report<W: Write>(out: &mut W, report: &OccupancyReport, format: &str) -> anyhow::Result<()> {
    match format {
        "csv" => write_csv(out, report),
        "json" => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
            Ok(())
        }
        _ => write_table(out, report),
    }
}

/// Write the "no overlapping data" outcome.  CSV and JSON callers still get a
/// parseable document with no rows.
pub fn write_no_overlap<W: Write>(out: &mut W, reason: &str, format: &str) -> anyhow::Result<()> {
    match format {
        "csv" | "json" => {
            let empty = OccupancyReport {
                rows: Vec::new(),
                in_lanes: Vec::new(),
                out_lanes: Vec::new(),
            };
            write_report(out, &empty, format)
        }
        _ => {
            writeln!(out, "No overlapping data: {}", reason)?;
            Ok(())
        }
    }
}

fn write_csv<W: Write>(out: &mut W, report: &OccupancyReport) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["date", "hour", "minute", "in", "out", "delta", "cumulative"])?;
    for row in &report.rows {
        wtr.write_record([
            row.bucket.date.to_string(),
            row.bucket.hour.to_string(),
            row.bucket.minute.to_string(),
            row.in_count.to_string(),
            row.out_count.to_string(),
            row.delta.to_string(),
            row.cumulative.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_table<W: Write>(out: &mut W, report: &OccupancyReport) -> anyhow::Result<()> {
    writeln!(
        out,
        "{:<16} {:>10} {:>10} {:>10} {:>12}",
        "bucket", "in", "out", "delta", "cumulative"
    )?;
    for row in &report.rows {
        writeln!(
            out,
            "{:<16} {:>10.1} {:>10.1} {:>10.1} {:>12.1}",
            row.bucket.to_string(),
            row.in_count,
            row.out_count,
            row.delta,
            row.cumulative
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "{:<12} {:>7} {:>10} {:>10} {:>10}",
        "column", "count", "mean", "min", "max"
    )?;
    let columns: [(&str, fn(&occupancy_core::models::OccupancyRecord) -> f64); 4] = [
        ("in", |r| r.in_count),
        ("out", |r| r.out_count),
        ("delta", |r| r.delta),
        ("cumulative", |r| r.cumulative),
    ];
    for (name, get) in columns {
        if let Some(s) = summarize(report.rows.iter().map(get)) {
            writeln!(
                out,
                "{:<12} {:>7} {:>10.2} {:>10.2} {:>10.2}",
                name, s.count, s.mean, s.min, s.max
            )?;
        }
    }

    writeln!(out)?;
    for lane in &report.in_lanes {
        write_lane(out, "in", lane)?;
    }
    for lane in &report.out_lanes {
        write_lane(out, "out", lane)?;
    }
    Ok(())
}

fn write_lane<W: Write>(out: &mut W, direction: &str, lane: &LaneReport) -> anyhow::Result<()> {
    let s = &lane.stats;
    writeln!(
        out,
        "{:<3} {}: {} readings ({} without counter), {} resets, {} glitches removed, \
         {} partitions, {} buckets, total {:.1}",
        direction,
        lane.lane,
        s.records_in,
        s.missing_counter,
        s.resets_detected,
        s.glitches_removed,
        s.partitions,
        lane.buckets,
        lane.total
    )?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use occupancy_core::models::{BucketKey, OccupancyRecord};
    use occupancy_data::counter::ReconcileStats;

    fn sample_report() -> OccupancyReport {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        OccupancyReport {
            rows: vec![
                OccupancyRecord {
                    bucket: BucketKey::hourly(d, 9),
                    in_count: 7.0,
                    out_count: 2.0,
                    delta: 5.0,
                    cumulative: 5.0,
                },
                OccupancyRecord {
                    bucket: BucketKey::hourly(d, 10),
                    in_count: 3.0,
                    out_count: 6.0,
                    delta: -3.0,
                    cumulative: 2.0,
                },
            ],
            in_lanes: vec![LaneReport {
                lane: "A:eventsCountA".to_string(),
                buckets: 2,
                total: 10.0,
                stats: ReconcileStats {
                    records_in: 4,
                    resets_detected: 1,
                    partitions: 2,
                    records_out: 4,
                    ..Default::default()
                },
            }],
            out_lanes: vec![],
        }
    }

    fn render(format: &str) -> String {
        let mut buf = Vec::new();
        write_report(&mut buf, &sample_report(), format).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn test_csv_output() {
        let text = render("csv");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,hour,minute,in,out,delta,cumulative");
        assert_eq!(lines[1], "2024-03-01,9,0,7,2,5,5");
        assert_eq!(lines[2], "2024-03-01,10,0,3,6,-3,2");
    }

    #[test]
    fn test_json_output() {
        let value: serde_json::Value = serde_json::from_str(&render("json")).expect("json");
        assert_eq!(value["rows"][1]["cumulative"], 2.0);
        assert_eq!(value["rows"][0]["in"], 7.0);
        assert_eq!(value["in_lanes"][0]["stats"]["resets_detected"], 1);
    }

    #[test]
    fn test_table_output_contains_rows_and_summary() {
        let text = render("table");
        assert!(text.contains("2024-03-01 09:00"));
        assert!(text.contains("cumulative"));
        assert!(text.contains("A:eventsCountA: 4 readings"));
        assert!(text.lines().any(|l| l.starts_with("delta") && l.contains("1.00")));
    }

    fn render_no_overlap(format: &str) -> String {
        let mut buf = Vec::new();
        write_no_overlap(&mut buf, "No overlapping buckets in in/out join", format).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn test_no_overlap_csv_is_header_only() {
        assert_eq!(
            render_no_overlap("csv"),
            "date,hour,minute,in,out,delta,cumulative\n"
        );
    }

    #[test]
    fn test_no_overlap_json_has_empty_rows() {
        let value: serde_json::Value =
            serde_json::from_str(&render_no_overlap("json")).expect("json");
        assert_eq!(value["rows"], serde_json::json!([]));
        assert_eq!(value["in_lanes"], serde_json::json!([]));
    }

    #[test]
    fn test_no_overlap_table_is_a_message() {
        let text = render_no_overlap("table");
        assert!(text.starts_with("No overlapping data: No overlapping buckets"));
    }

    #[test]
    fn test_summarize() {
        let s = summarize([1.0, -3.0, 5.0].into_iter()).unwrap();
        assert_eq!((s.count, s.min, s.max), (3, -3.0, 5.0));
        assert!((s.mean - 1.0).abs() < 1e-12);
        assert!(summarize(std::iter::empty()).is_none());
    }
}
