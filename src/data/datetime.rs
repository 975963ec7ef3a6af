use chrono::{DateTime, NaiveDateTime};

/// Timestamp embedded in capture file names (sortable, second resolution).
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Prefix shared by every capture file; the analyzer lists files by it.
pub const FILE_PREFIX: &str = "current_measurement_";

/// ISO 8601 with microseconds, written into the `Timestamp` column.
pub const RECORD_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Formats accepted when reading the `Timestamp` column back.
pub const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// `current_measurement_YYYYMMDD_HHMMSS.csv` for a capture started at `at`.
pub fn capture_file_name(at: NaiveDateTime) -> String {
    format!("{FILE_PREFIX}{}.csv", at.format(FILE_STAMP_FORMAT))
}

pub fn format_record_timestamp(ts: NaiveDateTime) -> String {
    ts.format(RECORD_FORMAT).to_string()
}

/// Parse a `Timestamp` cell. RFC 3339 values with an offset keep the wall
/// time of that offset.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for &fmt in ACCEPTED_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Signed seconds from `from` to `to`, microsecond precision.
pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Human-readable timestamp. Shows microseconds only when present.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    use chrono::Timelike;
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}
