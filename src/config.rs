//! Monitor configuration: JSON file with CLI overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("No watch directory configured")]
    MissingWatchDir,
}

fn default_recursive() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub watch_dir: Option<String>,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default)]
    pub debug: bool,
    /// Directory for daily-rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_dir: None,
            recursive: true,
            debug: false,
            log_dir: None,
        }
    }
}

/// Overrides from the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub watch_dir: Option<String>,
    pub recursive: Option<bool>,
    pub debug: Option<bool>,
    pub log_dir: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn merge_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(dir) = cli.watch_dir {
            self.watch_dir = Some(dir);
        }
        if let Some(recursive) = cli.recursive {
            self.recursive = recursive;
        }
        if let Some(debug) = cli.debug {
            self.debug = debug;
        }
        if let Some(log_dir) = cli.log_dir {
            self.log_dir = Some(log_dir);
        }
        self
    }

    pub fn watch_dir(&self) -> Result<&str, ConfigError> {
        self.watch_dir.as_deref().ok_or(ConfigError::MissingWatchDir)
    }
}
