//! Delimited-text and JSON ingestion into a [`RawTable`].
//!
//! Cells are kept as text (empty cells become `Null`); type coercion is the
//! normaliser's job.  Sensor ids made only of digits therefore keep their
//! leading zeros.

use std::io::Read;
use std::path::Path;

use occupancy_core::error::{OccupancyError, Result};
use occupancy_core::models::{CellValue, RawTable};
use tracing::debug;

/// Convert a delimiter character to the single byte the CSV reader needs.
pub fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            OccupancyError::InvalidConfig(format!(
                "delimiter {:?} is not a single ASCII character",
                delimiter
            ))
        })
}

/// Read a header row plus data rows from delimited text.
pub fn read_csv<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| OccupancyError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| OccupancyError::Csv(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        CellValue::Null
                    } else {
                        CellValue::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    RawTable::new(columns, rows)
}

/// Read any of the JSON table shapes accepted by [`RawTable::from_json`].
pub fn read_json<R: Read>(reader: R) -> Result<RawTable> {
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    RawTable::from_json(&value)
}

/// Load a table from disk.  `.json` files are read as JSON, anything else as
/// delimited text.
pub fn load_table(path: &Path, delimiter: u8) -> Result<RawTable> {
    let file = std::fs::File::open(path).map_err(|source| OccupancyError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let table = if is_json {
        read_json(reader)?
    } else {
        read_csv(reader, delimiter)?
    };

    debug!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SENSORS_CSV: &str = "\
Timestamp;Entity Name;eventsCountA;eventsCountB
2024-03-01 09:00:00;034050780000000A;10;100
2024-03-01 09:30:00;034050780000000A;;101
2024-03-01 09:10:00;0340507800000001;20;0
";

    #[test]
    fn test_read_csv_semicolon() {
        let table = read_csv(SENSORS_CSV.as_bytes(), b';').unwrap();
        assert_eq!(
            table.columns(),
            &["Timestamp", "Entity Name", "eventsCountA", "eventsCountB"]
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[1][2], CellValue::Null);
    }

    #[test]
    fn test_read_csv_keeps_leading_zeros() {
        let table = read_csv(SENSORS_CSV.as_bytes(), b';').unwrap();
        assert_eq!(
            table.rows()[2][1],
            CellValue::Text("0340507800000001".to_string())
        );
        assert_eq!(table.filter_eq("Entity Name", "0340507800000001").unwrap().len(), 1);
    }

    #[test]
    fn test_read_csv_ragged_row_is_error() {
        let err = read_csv("a,b\n1,2,3\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, OccupancyError::Csv(_)));
    }

    #[test]
    fn test_load_table_by_extension() {
        let tmp = TempDir::new().expect("tempdir");
        let csv_path = tmp.path().join("sensors.csv");
        std::fs::write(&csv_path, SENSORS_CSV).expect("write csv");
        let json_path = tmp.path().join("sensors.json");
        std::fs::write(
            &json_path,
            r#"[{"timestamp": "2024-03-01T09:00:00Z", "counter": 1, "uuid": "A"}]"#,
        )
        .expect("write json");

        assert_eq!(load_table(&csv_path, b';').unwrap().len(), 3);
        assert_eq!(load_table(&json_path, b';').unwrap().len(), 1);
    }

    #[test]
    fn test_load_table_missing_file() {
        let err = load_table(Path::new("/nonexistent/sensors.csv"), b',').unwrap_err();
        assert!(matches!(err, OccupancyError::FileRead { .. }));
    }

    #[test]
    fn test_delimiter_byte() {
        assert_eq!(delimiter_byte(';').unwrap(), b';');
        assert!(delimiter_byte('€').is_err());
    }
}
