use std::fs::File;
use std::io;
use std::path::Path;

use crate::data::datetime::parse_timestamp;
use crate::error::LoadError;
use crate::state::dataset::Dataset;
use crate::state::measurement::{Measurement, CSV_HEADER, DERIVED_COLUMN, RAW_COLUMN, TIMESTAMP_COLUMN};

/// Load a capture CSV into a [`Dataset`]. Either every row parses or nothing
/// is returned.
pub fn load_dataset(path: &Path) -> Result<Dataset, LoadError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let records = read_measurements(file)?;
    tracing::debug!("Parsed {} rows from {:?}", records.len(), path);
    Dataset::new(path, records).ok_or(LoadError::Empty)
}

/// Parse the fixed three-column schema from any reader.
pub fn read_measurements<R: io::Read>(reader: R) -> Result<Vec<Measurement>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let header: Vec<String> = reader.headers()?.iter().map(|s| s.trim().to_string()).collect();
    if header != CSV_HEADER {
        return Err(LoadError::Schema {
            found: header,
            expected: CSV_HEADER.iter().map(|s| s.to_string()).collect(),
        });
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: usize| row.get(idx).unwrap_or_default();

        let timestamp = parse_timestamp(cell(0)).ok_or_else(|| LoadError::Row {
            line,
            column: TIMESTAMP_COLUMN,
            value: cell(0).to_string(),
        })?;
        let raw_value = cell(1).parse::<i64>().map_err(|_| LoadError::Row {
            line,
            column: RAW_COLUMN,
            value: cell(1).to_string(),
        })?;
        let derived_value = cell(2)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LoadError::Row {
                line,
                column: DERIVED_COLUMN,
                value: cell(2).to_string(),
            })?;

        records.push(Measurement::new(timestamp, raw_value, derived_value));
    }

    Ok(records)
}
