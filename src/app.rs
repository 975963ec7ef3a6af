use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::capture::cancel::CancelToken;
use crate::capture::channel::{discover_ports, select_port, PortInfo, SerialChannel};
use crate::capture::controller::{EndReason, SessionController};
use crate::config::LoggerConfig;
use crate::data::datetime::FILE_PREFIX;
use crate::data::loader::load_dataset;
use crate::render::{chart, summary};

/// How a command finished, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

/// Discover ports, pick one and record until interrupted.
pub fn run_logger(config: LoggerConfig, cancel: CancelToken) -> Result<Outcome> {
    let stdout = io::stdout();
    let mut console = stdout.lock();
    writeln!(console, "{}", "=".repeat(60))?;
    writeln!(console, "CS1237 current logger")?;
    writeln!(console, "{}", "=".repeat(60))?;

    let ports = match discover_ports() {
        Ok(ports) => ports,
        Err(e) => {
            writeln!(console, "Cannot list serial ports: {e}")?;
            return Ok(Outcome::Failed);
        }
    };
    log_on_ports(&ports, config, cancel, console)
}

/// Record on the preferred discovered port. Having no port at all is not a
/// failure: the operator is told and the command ends cleanly.
pub fn log_on_ports<W: Write>(
    ports: &[PortInfo],
    config: LoggerConfig,
    cancel: CancelToken,
    mut console: W,
) -> Result<Outcome> {
    let port = match select_port(ports, config.preferred_port.as_deref()) {
        Ok(port) => port,
        Err(e) => {
            writeln!(console, "{e}. Check that the board is connected and its driver installed.")?;
            return Ok(Outcome::Cancelled);
        }
    };
    writeln!(console, "Available serial ports:")?;
    for p in ports {
        writeln!(console, "   - {}: {}", p.name, p.description)?;
    }

    let port_name = port.name.clone();
    writeln!(console)?;
    writeln!(console, "Using serial port: {port_name} ({} baud)", config.baud_rate)?;
    writeln!(console, "{}", "-".repeat(60))?;

    let controller = SessionController::new(config, cancel, console);
    let summary = controller
        .run(|cfg| SerialChannel::open(&port_name, cfg))
        .context("cannot start capture session")?;

    Ok(match summary.end_reason {
        EndReason::Interrupted => Outcome::Completed,
        EndReason::ConnectionFailed(_) | EndReason::ChannelError(_) | EndReason::RecorderError(_) => {
            Outcome::Failed
        }
    })
}

/// A capture file offered in the selection menu.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Capture files in `data_dir`, newest first. A missing directory yields an
/// empty list.
pub fn list_capture_files(data_dir: &Path) -> io::Result<Vec<CaptureFile>> {
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(FILE_PREFIX) || !name.ends_with(".csv") {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        files.push(CaptureFile {
            path: entry.path(),
            size_bytes: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    Invalid,
}

/// Turn menu input into a zero-based index. Empty input picks the first entry.
pub fn parse_selection(input: &str, count: usize) -> Selection {
    let input = input.trim();
    if input.is_empty() {
        return if count > 0 { Selection::Index(0) } else { Selection::Invalid };
    }
    match input.parse::<usize>() {
        Ok(n) if n >= 1 && n <= count => Selection::Index(n - 1),
        _ => Selection::Invalid,
    }
}

/// The file picked by menu input. `None` means the input was invalid.
pub fn choose_file(files: &[CaptureFile], input: &str) -> Option<PathBuf> {
    match parse_selection(input, files.len()) {
        Selection::Index(i) => Some(files[i].path.clone()),
        Selection::Invalid => None,
    }
}

/// List the capture files, newest first, followed by the selection prompt.
pub fn show_menu<W: Write>(files: &[CaptureFile], output: &mut W) -> io::Result<()> {
    writeln!(output, "Capture files found:")?;
    for (i, f) in files.iter().enumerate() {
        let modified: DateTime<Local> = f.modified.into();
        writeln!(
            output,
            "   {}. {} ({:.1} KB, {})",
            i + 1,
            f.path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            f.size_bytes as f64 / 1024.0,
            modified.format("%Y-%m-%d %H:%M:%S")
        )?;
    }
    write!(output, "\nSelect a file to analyze (1-{}) [default: 1]: ", files.len())?;
    output.flush()
}

/// Read one line from stdin on a helper thread so an interrupt can end the
/// wait. `None` on end of input or cancellation.
fn read_stdin_line(cancel: &CancelToken) -> io::Result<Option<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let mut line = String::new();
            let read = io::stdin()
                .lock()
                .read_line(&mut line)
                .map(|n| (n > 0).then_some(line));
            let _ = tx.send(read);
        })?;
    await_line(&rx, cancel)
}

fn await_line(rx: &Receiver<io::Result<Option<String>>>, cancel: &CancelToken) -> io::Result<Option<String>> {
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(read) => return read,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(None),
        }
    }
}

/// Load, report, plot and summarize one capture file.
pub fn run_analyzer(csv: Option<PathBuf>, data_dir: &Path, cancel: &CancelToken) -> Result<Outcome> {
    let path = match csv {
        Some(p) => p,
        None => {
            let files = list_capture_files(data_dir)
                .with_context(|| format!("cannot list {}", data_dir.display()))?;
            if files.is_empty() {
                println!("No capture files found in {}", data_dir.display());
                println!("Run `currentlog log` first to record some data.");
                return Ok(Outcome::Cancelled);
            }
            show_menu(&files, &mut io::stdout().lock())?;
            match read_stdin_line(cancel)?.and_then(|line| choose_file(&files, &line)) {
                Some(p) => p,
                None => {
                    println!("\nSelection cancelled");
                    return Ok(Outcome::Cancelled);
                }
            }
        }
    };

    println!("Loading {}", path.display());
    let dataset = match load_dataset(&path) {
        Ok(ds) => ds,
        Err(e) if e.is_not_found() => {
            println!("File not found: {}", path.display());
            return Ok(Outcome::Failed);
        }
        Err(e) => {
            println!("Failed to load data: {e}");
            return Ok(Outcome::Failed);
        }
    };
    println!("Loaded {} records", dataset.len());
    if cancel.is_cancelled() {
        println!("Analysis cancelled");
        return Ok(Outcome::Cancelled);
    }
    println!();
    print!("{}", summary::format_console_report(&dataset));

    println!();
    println!("Rendering figure...");
    let figure = chart::save_figure(&dataset).context("cannot save figure")?;
    println!("Figure saved: {}", figure.display());

    let summary_file = summary::write_summary(&dataset, Local::now().naive_local())
        .context("cannot save summary")?;
    println!("Summary saved: {}", summary_file.display());

    println!();
    println!("Analysis complete");
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("", 3), Selection::Index(0));
        assert_eq!(parse_selection("  \n", 3), Selection::Index(0));
        assert_eq!(parse_selection("2\n", 3), Selection::Index(1));
        assert_eq!(parse_selection("3", 3), Selection::Index(2));
        assert_eq!(parse_selection("0", 3), Selection::Invalid);
        assert_eq!(parse_selection("4", 3), Selection::Invalid);
        assert_eq!(parse_selection("two", 3), Selection::Invalid);
        assert_eq!(parse_selection("-1", 3), Selection::Invalid);
        assert_eq!(parse_selection("", 0), Selection::Invalid);
    }

    fn capture(name: &str, age_secs: u64) -> CaptureFile {
        CaptureFile {
            path: PathBuf::from("data").join(name),
            size_bytes: 2048,
            modified: SystemTime::now() - Duration::from_secs(age_secs),
        }
    }

    #[test]
    fn test_menu_default_and_choice() {
        let files = vec![capture("current_measurement_b.csv", 10), capture("current_measurement_a.csv", 100)];

        let mut out = Vec::new();
        show_menu(&files, &mut out).unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("1. current_measurement_b.csv (2.0 KB"));
        assert!(shown.contains("[default: 1]"));

        assert_eq!(choose_file(&files, "\n"), Some(files[0].path.clone()));
        assert_eq!(choose_file(&files, "2\n"), Some(files[1].path.clone()));
    }

    #[test]
    fn test_invalid_choice_cancels() {
        let files = vec![capture("current_measurement_a.csv", 1)];
        assert_eq!(choose_file(&files, "9\n"), None);
        assert_eq!(choose_file(&files, "x"), None);
    }

    #[test]
    fn test_list_capture_files_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("current_measurement_20250101_000000.csv");
        let new = dir.path().join("current_measurement_20250102_000000.csv");
        fs::write(&old, "x").unwrap();
        fs::write(&new, "xy").unwrap();
        fs::write(dir.path().join("notes.csv"), "x").unwrap();
        fs::write(dir.path().join("current_measurement_x_summary.txt"), "x").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options().write(true).open(&old).unwrap().set_modified(past).unwrap();

        let files = list_capture_files(dir.path()).unwrap();
        let names: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(names, vec![new, old]);
        assert_eq!(files[0].size_bytes, 2);
    }

    #[test]
    fn test_no_ports_ends_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggerConfig {
            data_dir: dir.path().join("data"),
            ..LoggerConfig::default()
        };
        let mut console = Vec::new();
        let outcome = log_on_ports(&[], config, CancelToken::new(), &mut console).unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        let out = String::from_utf8(console).unwrap();
        assert!(out.contains("no serial ports found"));
        // nothing was recorded
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_interrupt_ends_menu_wait() {
        let (_tx, rx) = mpsc::channel::<io::Result<Option<String>>>();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(await_line(&rx, &cancel).unwrap(), None);
    }

    #[test]
    fn test_menu_wait_returns_typed_line() {
        let (tx, rx) = mpsc::channel();
        tx.send(Ok(Some("2\n".to_string()))).unwrap();
        assert_eq!(await_line(&rx, &CancelToken::new()).unwrap(), Some("2\n".to_string()));

        drop(tx);
        assert_eq!(await_line(&rx, &CancelToken::new()).unwrap(), None);
    }

    #[test]
    fn test_analyzer_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("current_measurement_19700101_000000.csv");
        let outcome = run_analyzer(Some(missing), dir.path(), &CancelToken::new()).unwrap();
        assert_eq!(outcome, Outcome::Failed);
    }

    #[test]
    fn test_missing_data_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_capture_files(&dir.path().join("data")).unwrap().is_empty());
    }
}
