// src/config.rs
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::{Result, WatchError};
use crate::models::ExecutionTask;

const DEFAULT_API_BASE: &str = "http://localhost:7113/_api";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Where and how to reach the Evaluation Service.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base: String,
    /// Session token forwarded as a cookie, if any.
    pub token: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Reads a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Default config file (if present) overlaid with the environment.
    pub fn load() -> Result<Self> {
        let base = match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(api_base) = var("RUNWATCH_API_BASE") {
            self.api_base = api_base;
        }
        if let Some(token) = var("RUNWATCH_TOKEN") {
            self.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(timeout) = var("RUNWATCH_CONNECT_TIMEOUT") {
            self.connect_timeout_secs = timeout.trim().parse().map_err(|_| {
                WatchError::Config(format!("RUNWATCH_CONNECT_TIMEOUT must be a number of seconds, got '{}'", timeout))
            })?;
        }
        Ok(self)
    }
}

/// `<config dir>/runwatch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("runwatch").join("config.toml"))
}

/// A run described on disk.
///
/// Code fragments are given inline with `code`, or as files with `sources`
/// (resolved relative to the run file); not both.
#[derive(Deserialize, Debug, Clone)]
pub struct RunFile {
    pub unit: String,
    pub index: u32,
    #[serde(default)]
    pub code: Vec<String>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

impl RunFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Builds the task, reading any source files relative to `base_dir`.
    pub fn into_task(self, base_dir: &Path) -> Result<ExecutionTask> {
        if !self.code.is_empty() && !self.sources.is_empty() {
            return Err(WatchError::Config(
                "A run file may set either `code` or `sources`, not both.".to_string(),
            ));
        }
        let code = if self.sources.is_empty() {
            self.code
        } else {
            self.sources
                .iter()
                .map(|source| std::fs::read_to_string(base_dir.join(source)))
                .collect::<std::io::Result<Vec<_>>>()?
        };
        Ok(ExecutionTask::new(self.unit, self.index, code))
    }
}
