use std::collections::VecDeque;
use std::io;
use std::path::Path;

use currentlog::capture::cancel::CancelToken;
use currentlog::capture::channel::LineSource;
use currentlog::capture::controller::{EndReason, SessionController, SessionSummary};
use currentlog::capture::recorder::SessionRecorder;
use currentlog::config::LoggerConfig;
use currentlog::data::loader::load_dataset;
use currentlog::error::LoadError;
use currentlog::render::{chart, summary};

/// Feeds fixed device output, then behaves like an operator pressing Ctrl+C.
struct DeviceReplay {
    lines: VecDeque<Vec<u8>>,
    cancel: CancelToken,
}

impl LineSource for DeviceReplay {
    fn poll_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None => {
                self.cancel.cancel();
                Ok(None)
            }
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture(dir: &Path, lines: &[&str]) -> (SessionSummary, String) {
    let cancel = CancelToken::new();
    let replay = DeviceReplay {
        lines: lines.iter().map(|l| format!("{l}\r").into_bytes()).collect(),
        cancel: cancel.clone(),
    };
    let config = LoggerConfig {
        data_dir: dir.to_path_buf(),
        settle_ms: 0,
        poll_interval_ms: 0,
        ..LoggerConfig::default()
    };

    let mut console = Vec::new();
    let summary = SessionController::new(config, cancel, &mut console)
        .run(|_| Ok(replay))
        .expect("session runs");
    (summary, String::from_utf8(console).unwrap())
}

#[test]
fn scenario_two_readings_produce_expected_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, _) = capture(
        dir.path(),
        &[
            "=== CS1237 startup ===",
            "ADC: 1000 | Current: 0.001000 A",
            "ADC: 2000 | Current: 0.002000 A",
        ],
    );
    assert_eq!(summary.end_reason, EndReason::Interrupted);
    assert_eq!(summary.records_written, 2);

    let ds = load_dataset(&summary.csv_path).unwrap();
    assert_eq!(ds.len(), 2);

    let raw = ds.raw_stats();
    assert_eq!(raw.mean, 1500.0);
    assert_eq!(raw.min, 1000.0);
    assert_eq!(raw.max, 2000.0);

    let cur = ds.derived_stats();
    assert!((cur.mean - 0.0015).abs() < 1e-12);
    assert_eq!(cur.min, 0.001);
    assert_eq!(cur.max, 0.002);
    assert!(ds.duration_seconds() >= 0.0);
}

#[test]
fn scenario_diagnostic_line_is_echoed_without_a_row() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, console) = capture(dir.path(), &["booting up, ADC ready"]);

    assert_eq!(summary.records_written, 0);
    assert!(console.contains("info: booting up, ADC ready"));
    let text = std::fs::read_to_string(&summary.csv_path).unwrap();
    assert_eq!(text.lines().collect::<Vec<_>>(), vec!["Timestamp,ADC_Raw_Value,Current_A"]);

    // header-only capture is a load error, not a crash
    assert!(matches!(load_dataset(&summary.csv_path), Err(LoadError::Empty)));
}

#[test]
fn scenario_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_dataset(&dir.path().join("current_measurement_19700101_000000.csv")).unwrap_err();
    assert!(err.is_not_found());

    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "Timestamp,ADC_Raw_Value\n2025-07-13T00:00:00,1\n").unwrap();
    let err = load_dataset(&bad).unwrap_err();
    assert!(!err.is_not_found());
    assert!(matches!(err, LoadError::Schema { .. }));
}

#[test]
fn recorder_round_trip_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let values = [
        (0, 0.0),
        (-8_388_607, -0.123456789),
        (8_388_607, 1.5),
        (42, 0.0000004),
        (-1, -0.0000006),
    ];

    let mut rec = SessionRecorder::open(dir.path()).unwrap();
    for &(raw, cur) in &values {
        rec.append(raw, cur).unwrap();
    }
    let path = rec.path().to_path_buf();
    rec.close().unwrap();

    let ds = load_dataset(&path).unwrap();
    assert_eq!(ds.len(), values.len());
    for (m, &(raw, cur)) in ds.records().iter().zip(&values) {
        assert_eq!(m.raw_value, raw);
        assert!((m.derived_value - cur).abs() <= 0.5e-6 + 1e-12, "{} vs {}", m.derived_value, cur);
    }
    let ts: Vec<_> = ds.records().iter().map(|m| m.timestamp).collect();
    assert!(ts.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn analysis_artifacts_are_written_beside_the_csv() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..120)
        .map(|i| format!("ADC: {} | Current: {:.6} A", 1000 + (i % 7) * 13, 0.001 + (i % 5) as f64 * 1e-5))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let (session, _) = capture(dir.path(), &refs);

    let ds = load_dataset(&session.csv_path).unwrap();
    let figure = chart::save_figure(&ds).unwrap();
    let report = summary::write_summary(&ds, chrono::Local::now().naive_local()).unwrap();

    let stem = session.csv_path.file_stem().unwrap().to_string_lossy().into_owned();
    assert_eq!(figure, dir.path().join(format!("{stem}_analysis.png")));
    assert_eq!(report, dir.path().join(format!("{stem}_summary.txt")));

    let png = std::fs::read(&figure).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains("Records: 120"));
}

#[test]
fn loading_twice_gives_identical_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, _) = capture(
        dir.path(),
        &[
            "ADC: 10 | Current: 0.000010 A",
            "ADC: 30 | Current: 0.000030 A",
            "ADC: 20 | Current: 0.000020 A",
        ],
    );
    let a = load_dataset(&summary.csv_path).unwrap();
    let b = load_dataset(&summary.csv_path).unwrap();
    assert_eq!(a.raw_stats(), b.raw_stats());
    assert_eq!(a.derived_stats(), b.derived_stats());
    assert_eq!(a.raw_stats().median, 20.0);
}
