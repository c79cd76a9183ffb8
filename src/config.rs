// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Parse session settings, optionally read from a TOML file.
//!
//! ```toml
//! time_ratio = 10
//! stop_timeout_ms = 500
//! progress_step = 0.05
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings threaded into a parse. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Multiplier applied to every normalized timestamp.
    pub time_ratio: u64,
    /// How long `stop()` waits for the worker to wind down.
    pub stop_timeout_ms: u64,
    /// Smallest progress change, as a fraction, worth a notification.
    pub progress_step: f64,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            time_ratio: 1,
            stop_timeout_ms: 2000,
            progress_step: 0.01,
        }
    }
}

impl ParseConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The ratio to scale timestamps by; never 0.
    pub fn time_ratio(&self) -> u64 {
        if self.time_ratio == 0 {
            clilog::warn!("time_ratio of 0 is not usable, using 1");
            return 1;
        }
        self.time_ratio
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
