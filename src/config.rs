//! Configuration management for daylog

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::{is_level_valid, DEFAULT_CAPACITY, DEFAULT_LOG_LEVEL, MAX_LOG_LEVEL};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "daylog.toml";

/// Backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for daily log files (default: /logs, created on first use)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Number of lines buffered before they are written out (default: 256)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Prefix each line with `HH:MM:SS.ffffff` (default: true)
    #[serde(default = "default_timestamp")]
    pub timestamp: bool,

    /// Threshold for loggers created without an explicit level (default: 6)
    #[serde(default = "default_level")]
    pub default_level: i32,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_timestamp() -> bool {
    true
}

fn default_level() -> i32 {
    DEFAULT_LOG_LEVEL
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: None,
            capacity: default_capacity(),
            timestamp: default_timestamp(),
            default_level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from `daylog.toml`, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load configuration from a file, or return default if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            anyhow::bail!("capacity must be at least 1");
        }
        if !is_level_valid(self.default_level) {
            anyhow::bail!(
                "default_level {} is outside 0..={}",
                self.default_level,
                MAX_LOG_LEVEL
            );
        }
        Ok(())
    }
}
