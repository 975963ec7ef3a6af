use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "currentlog.json";

/// Directory holding capture files, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM9";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Device diagnostic vocabulary echoed when a line carries no reading.
pub const DEFAULT_INFO_KEYWORDS: &[&str] = &["ADC", "配置", "錯誤", "啟動", "開始"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Used when it is among the discovered ports, otherwise the first one is.
    pub preferred_port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Time given to the board to finish its reset after the port opens.
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub data_dir: PathBuf,
    pub info_keywords: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            preferred_port: Some(DEFAULT_PORT.to_string()),
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            settle_ms: 2000,
            poll_interval_ms: 10,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            info_keywords: DEFAULT_INFO_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LoggerConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or
    /// fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let p = Path::new(DEFAULT_CONFIG_FILE);
                if p.exists() {
                    Self::from_file(p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
