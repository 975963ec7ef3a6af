use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::capture::cancel::CancelToken;
use crate::capture::channel::LineSource;
use crate::capture::recorder::SessionRecorder;
use crate::config::LoggerConfig;
use crate::data::parser::{is_informational, parse_line};
use crate::error::CaptureError;
use crate::state::measurement::Measurement;

/// Slice used while waiting for the board to settle, so a cancel is noticed.
const SETTLE_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Recording,
    Closing,
    Closed,
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Interrupted,
    ConnectionFailed(String),
    ChannelError(String),
    RecorderError(String),
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub csv_path: PathBuf,
    pub records_written: u64,
    /// Time spent in `Recording`; zero if the loop never started.
    pub elapsed: Duration,
    pub end_reason: EndReason,
    /// Every state the session passed through, starting with `Idle`.
    pub states: Vec<SessionState>,
}

/// What one line from the device turned into.
#[derive(Debug, Clone, PartialEq)]
enum LineOutcome {
    Recorded(Measurement),
    Informational(String),
    Ignored,
}

/// Drives one capture session: file first, then the channel, then the read
/// loop until cancelled or the channel fails. `run` consumes the controller.
pub struct SessionController<W: Write> {
    config: LoggerConfig,
    cancel: CancelToken,
    console: W,
    states: Vec<SessionState>,
    recording_since: Option<Instant>,
}

impl<W: Write> SessionController<W> {
    pub fn new(config: LoggerConfig, cancel: CancelToken, console: W) -> Self {
        Self {
            config,
            cancel,
            console,
            states: vec![SessionState::Idle],
            recording_since: None,
        }
    }

    /// Run the session to completion. Only failing to create the capture file
    /// is returned as an error; every other stop is reported in the summary.
    pub fn run<S, F>(mut self, connect: F) -> Result<SessionSummary, CaptureError>
    where
        S: LineSource,
        F: FnOnce(&LoggerConfig) -> Result<S, CaptureError>,
    {
        let mut recorder = SessionRecorder::open(&self.config.data_dir)?;
        self.say(format_args!("CSV file created: {}", recorder.path().display()));

        self.transition(SessionState::Connecting);
        let end_reason = match connect(&self.config) {
            Ok(mut source) => self.record(&mut source, &mut recorder),
            Err(e) => {
                tracing::error!("Connection failed: {e}");
                self.say(format_args!("Connection failed: {e}"));
                EndReason::ConnectionFailed(e.to_string())
            }
        };

        self.transition(SessionState::Closing);
        if let Err(e) = recorder.close() {
            tracing::error!("Failed to close capture file: {e}");
            self.say(format_args!("Failed to close capture file: {e}"));
        }
        let elapsed = self.recording_since.map(|t| t.elapsed()).unwrap_or_default();
        self.transition(SessionState::Closed);
        let summary = SessionSummary {
            csv_path: recorder.path().to_path_buf(),
            records_written: recorder.records_written(),
            elapsed,
            end_reason,
            states: std::mem::take(&mut self.states),
        };

        self.say(format_args!("CSV file saved: {}", summary.csv_path.display()));
        if !matches!(summary.end_reason, EndReason::ConnectionFailed(_)) {
            self.say(format_args!("Total recording time: {:.1} s", elapsed.as_secs_f64()));
            self.say(format_args!("Total records: {}", summary.records_written));
        }
        Ok(summary)
    }

    /// Settle, flush stale input, then poll until stopped. The source is
    /// dropped by the caller once this returns.
    fn record<S: LineSource>(&mut self, source: &mut S, recorder: &mut SessionRecorder) -> EndReason {
        self.say(format_args!("Waiting for the board to initialize..."));
        if self.settle() {
            return EndReason::Interrupted;
        }
        if let Err(e) = source.discard_input() {
            tracing::warn!("Could not clear input buffer: {e}");
        }

        self.transition(SessionState::Recording);
        self.recording_since = Some(Instant::now());
        self.say(format_args!(
            "Recording started at {} (Ctrl+C to stop)",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        loop {
            if self.cancel.is_cancelled() {
                self.say(format_args!("Stop requested, shutting down"));
                return EndReason::Interrupted;
            }

            match source.poll_line() {
                Ok(Some(bytes)) => match self.handle_line(&bytes, recorder) {
                    Ok(LineOutcome::Recorded(m)) => {
                        let n = recorder.records_written();
                        self.say(format_args!(
                            "[{n:4}] {} | ADC: {:8} | Current: {:8.5} A",
                            m.timestamp.format("%H:%M:%S"),
                            m.raw_value,
                            m.derived_value
                        ));
                    }
                    Ok(LineOutcome::Informational(text)) => self.say(format_args!("info: {text}")),
                    Ok(LineOutcome::Ignored) => {}
                    Err(e) => {
                        tracing::error!("Failed to record measurement: {e}");
                        self.say(format_args!("Failed to record measurement: {e}"));
                        return EndReason::RecorderError(e.to_string());
                    }
                },
                Ok(None) => thread::sleep(self.config.poll_interval()),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
                Err(e) => {
                    tracing::error!("Serial channel failed: {e}");
                    self.say(format_args!("Serial channel failed: {e}"));
                    return EndReason::ChannelError(e.to_string());
                }
            }
        }
    }

    fn handle_line(&self, bytes: &[u8], recorder: &mut SessionRecorder) -> Result<LineOutcome, CaptureError> {
        let text = decode_line(bytes);
        let line = text.trim();
        if line.is_empty() {
            return Ok(LineOutcome::Ignored);
        }

        match parse_line(line) {
            Some(reading) => {
                let m = recorder.append(reading.raw_value, reading.derived_value)?;
                Ok(LineOutcome::Recorded(m))
            }
            None if is_informational(line, &self.config.info_keywords) => {
                Ok(LineOutcome::Informational(line.to_string()))
            }
            None => {
                tracing::trace!("Dropped line {line:?}");
                Ok(LineOutcome::Ignored)
            }
        }
    }

    /// Wait out the settle interval. Returns true if cancelled meanwhile.
    fn settle(&self) -> bool {
        let deadline = Instant::now() + self.config.settle();
        loop {
            if self.cancel.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(SETTLE_SLICE.min(deadline - now));
        }
    }

    fn transition(&mut self, next: SessionState) {
        if let Some(prev) = self.states.last() {
            tracing::debug!("Session {:?} -> {:?}", prev, next);
        }
        self.states.push(next);
    }

    fn say(&mut self, msg: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.console, "{msg}") {
            tracing::warn!("Console write failed: {e}");
        }
    }
}

/// Decode as UTF-8, dropping invalid sequences instead of failing.
pub fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains(char::REPLACEMENT_CHARACTER) {
        tracing::debug!("Dropped undecodable bytes from a line");
        text.chars().filter(|&c| c != char::REPLACEMENT_CHARACTER).collect()
    } else {
        text.into_owned()
    }
}
