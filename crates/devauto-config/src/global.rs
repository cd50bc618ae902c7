//! Global configuration for devauto
//!
//! Located at `~/.config/devauto/config.toml`

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Global devauto configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub defaults: DefaultsConfig,
    /// Extra environment variables for every task
    pub env: HashMap<String, String>,
}

/// Default runner settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Shell used to run task command bodies (`<shell> -c <command>`)
    pub shell: String,
    /// Maximum number of independent tasks running at once
    pub max_parallel: usize,
    /// Stop starting new tasks after the first failure
    pub fail_fast: bool,
    /// Per-task timeout in seconds; no timeout when unset
    pub task_timeout_secs: Option<u64>,
    /// Editor for `devauto config --edit` (falls back to $EDITOR)
    pub editor: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            max_parallel: 1,
            fail_fast: false,
            task_timeout_secs: None,
            editor: None,
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        if config.defaults.max_parallel == 0 {
            return Err(ConfigError::Invalid(format!(
                "defaults.max_parallel must be at least 1 in {}",
                path.display()
            )));
        }

        tracing::debug!(
            "Loaded config from {:?}: shell={}, max_parallel={}, fail_fast={}",
            path,
            config.defaults.shell,
            config.defaults.max_parallel,
            config.defaults.fail_fast
        );

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "devauto").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check if the config file exists on disk
    pub fn config_exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Task timeout as a Duration
    pub fn task_timeout(&self) -> Option<std::time::Duration> {
        self.defaults
            .task_timeout_secs
            .map(std::time::Duration::from_secs)
    }
}
