use std::io;
use std::path::PathBuf;

/// Failures while reading a measurement CSV back into a [`crate::state::dataset::Dataset`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected header {found:?}, expected {expected:?}")]
    Schema {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: invalid {column} value {value:?}")]
    Row {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("no measurements in file")]
    Empty,
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }
}

/// Failures on the capture path: file creation, serial channel, record writes.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("cannot open {port}: {reason}")]
    Connection { port: String, reason: String },

    #[error("no serial ports found")]
    NoPorts,

    #[error("serial port enumeration failed: {0}")]
    Discovery(String),

    #[error("channel I/O error: {0}")]
    Channel(#[source] io::Error),

    #[error("cannot create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[from] io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("session file already closed")]
    Closed,
}

/// Failures while producing the report artifacts.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
