use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::data::datetime::capture_file_name;
use crate::error::CaptureError;
use crate::state::measurement::{Measurement, CSV_HEADER};

/// Owns one capture CSV for the length of a session. Every append reaches
/// the disk before it returns; the file is released exactly once.
pub struct SessionRecorder {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    records_written: u64,
    last_timestamp: Option<NaiveDateTime>,
}

impl SessionRecorder {
    /// Create `current_measurement_<stamp>.csv` inside `dir` and write the
    /// header row.
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        Self::open_at(dir, Local::now().naive_local())
    }

    pub fn open_at(dir: &Path, now: NaiveDateTime) -> Result<Self, CaptureError> {
        fs::create_dir_all(dir).map_err(|source| CaptureError::Create {
            path: dir.to_path_buf(),
            source,
        })?;

        let (path, file) = create_unique(dir, &capture_file_name(now))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        tracing::info!("Created capture file {:?}", path);
        Ok(Self {
            path,
            writer: Some(writer),
            records_written: 0,
            last_timestamp: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Stamp and persist one reading.
    pub fn append(&mut self, raw_value: i64, derived_value: f64) -> Result<Measurement, CaptureError> {
        self.append_at(Local::now().naive_local(), raw_value, derived_value)
    }

    /// Like [`append`](Self::append) with an explicit capture time. A time
    /// earlier than the previous record is clamped to it.
    pub fn append_at(
        &mut self,
        now: NaiveDateTime,
        raw_value: i64,
        derived_value: f64,
    ) -> Result<Measurement, CaptureError> {
        let writer = self.writer.as_mut().ok_or(CaptureError::Closed)?;

        let timestamp = match self.last_timestamp {
            Some(prev) if now < prev => prev,
            _ => now,
        };
        let record = Measurement::new(timestamp, raw_value, derived_value);

        writer.write_record(record.to_row())?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        self.last_timestamp = Some(timestamp);
        self.records_written += 1;
        Ok(record)
    }

    /// Flush and release the file. Later calls do nothing.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        writer.get_ref().sync_all()?;
        tracing::info!(
            "Closed {:?} after {} records",
            self.path,
            self.records_written
        );
        Ok(())
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close {:?}: {e}", self.path);
        }
    }
}

/// Open `name` exclusively, adding `_1`, `_2`, ... before the extension when
/// a file of that name already exists.
fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File), CaptureError> {
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, "csv"));
    let mut attempt = 0u32;
    loop {
        let candidate = if attempt == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{stem}_{attempt}.{ext}"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 1000 => attempt += 1,
            Err(source) => {
                return Err(CaptureError::Create {
                    path: candidate,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 13)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap()
    }

    #[test]
    fn test_open_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let mut rec = SessionRecorder::open_at(&data, t0()).unwrap();
        assert_eq!(
            rec.path().file_name().unwrap(),
            "current_measurement_20250713_102030.csv"
        );
        let text = fs::read_to_string(rec.path()).unwrap();
        assert_eq!(text, "Timestamp,ADC_Raw_Value,Current_A\n");
        rec.close().unwrap();
    }

    #[test]
    fn test_append_is_visible_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = SessionRecorder::open_at(dir.path(), t0()).unwrap();
        rec.append_at(t0(), 1000, 0.001).unwrap();
        rec.append_at(t0() + Duration::seconds(1), -2000, -0.0025).unwrap();
        assert_eq!(rec.records_written(), 2);

        // still open: rows must already be on disk
        let text = fs::read_to_string(rec.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2025-07-13T10:20:30.000000,1000,0.001000");
        assert_eq!(lines[2], "2025-07-13T10:20:31.000000,-2000,-0.002500");
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = SessionRecorder::open_at(dir.path(), t0()).unwrap();
        let a = rec.append_at(t0() + Duration::seconds(5), 1, 0.1).unwrap();
        let b = rec.append_at(t0(), 2, 0.2).unwrap();
        assert_eq!(b.timestamp, a.timestamp);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = SessionRecorder::open_at(dir.path(), t0()).unwrap();
        rec.append_at(t0(), 1, 0.1).unwrap();
        rec.close().unwrap();
        assert!(rec.is_closed());
        rec.close().unwrap();
        assert!(matches!(rec.append_at(t0(), 2, 0.2), Err(CaptureError::Closed)));
        assert_eq!(rec.records_written(), 1);
    }

    #[test]
    fn test_same_second_does_not_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = SessionRecorder::open_at(dir.path(), t0()).unwrap();
        first.append_at(t0(), 1, 0.1).unwrap();
        let second = SessionRecorder::open_at(dir.path(), t0()).unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(
            second.path().file_name().unwrap(),
            "current_measurement_20250713_102030_1.csv"
        );
        let text = fs::read_to_string(first.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
