use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::data::datetime::seconds_between;
use crate::processing::statistics::SeriesStats;
use crate::state::measurement::Measurement;

/// Measurements loaded from one capture file, with statistics computed once
/// at construction. Never empty.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: PathBuf,
    records: Vec<Measurement>,
    raw_stats: SeriesStats,
    derived_stats: SeriesStats,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Dataset {
    /// Returns `None` for an empty record list or a derived column with no
    /// finite value.
    pub fn new(source: impl Into<PathBuf>, records: Vec<Measurement>) -> Option<Self> {
        let first = records.first()?;
        let (start, end) = records.iter().fold((first.timestamp, first.timestamp), |(lo, hi), m| {
            (lo.min(m.timestamp), hi.max(m.timestamp))
        });

        let raw: Vec<f64> = records.iter().map(|m| m.raw_value as f64).collect();
        let derived: Vec<f64> = records.iter().map(|m| m.derived_value).collect();
        let raw_stats = SeriesStats::compute(&raw)?;
        let derived_stats = SeriesStats::compute(&derived)?;

        Some(Self {
            source: source.into(),
            records,
            raw_stats,
            derived_stats,
            start,
            end,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn records(&self) -> &[Measurement] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn raw_stats(&self) -> &SeriesStats {
        &self.raw_stats
    }

    pub fn derived_stats(&self) -> &SeriesStats {
        &self.derived_stats
    }

    /// Earliest timestamp in the file.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Latest timestamp in the file.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// `max(ts) - min(ts)` in seconds.
    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.start, self.end).max(0.0)
    }

    /// Seconds since the first record, per record in file order.
    pub fn elapsed_seconds(&self) -> Vec<f64> {
        let origin = self.records[0].timestamp;
        self.records
            .iter()
            .map(|m| seconds_between(origin, m.timestamp))
            .collect()
    }

    pub fn raw_values(&self) -> Vec<f64> {
        self.records.iter().map(|m| m.raw_value as f64).collect()
    }

    pub fn derived_values(&self) -> Vec<f64> {
        self.records.iter().map(|m| m.derived_value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 13)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(Dataset::new("x.csv", Vec::new()).is_none());
    }

    #[test]
    fn test_single_record() {
        let ds = Dataset::new("x.csv", vec![Measurement::new(t0(), 5, 0.5)]).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.duration_seconds(), 0.0);
        assert_eq!(ds.elapsed_seconds(), vec![0.0]);
        assert!(ds.derived_stats().std_dev.is_nan());
    }

    #[test]
    fn test_duration_uses_extremes_not_order() {
        let records = vec![
            Measurement::new(t0() + Duration::seconds(3), 1, 0.1),
            Measurement::new(t0(), 2, 0.2),
            Measurement::new(t0() + Duration::milliseconds(1500), 3, 0.3),
        ];
        let ds = Dataset::new("x.csv", records).unwrap();
        assert_eq!(ds.start(), t0());
        assert_eq!(ds.end(), t0() + Duration::seconds(3));
        assert_eq!(ds.duration_seconds(), 3.0);
        assert_eq!(ds.elapsed_seconds(), vec![0.0, -3.0, -1.5]);
    }

    #[test]
    fn test_columns() {
        let records = vec![
            Measurement::new(t0(), 1000, 0.001),
            Measurement::new(t0() + Duration::seconds(1), 2000, 0.002),
        ];
        let ds = Dataset::new("x.csv", records).unwrap();
        assert_eq!(ds.raw_values(), vec![1000.0, 2000.0]);
        assert_eq!(ds.derived_values(), vec![0.001, 0.002]);
        assert_eq!(ds.raw_stats().mean, 1500.0);
    }
}
