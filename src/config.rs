//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The pair universe and batch size live here; nothing in the engine
//! hard-codes them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::signal::WINDOW;
use crate::types::ScanError;

/// Default number of candles requested per pair.
pub const DEFAULT_HISTORY_LEN: usize = 199;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    /// Ordered pair universe.
    pub pairs: Vec<String>,
    /// Pairs fetched concurrently per batch.
    pub batch_size: usize,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// Per-fetch timeout; `0` disables it.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl ScannerConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    /// Optional relay the request is routed through.
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("signal-scanner/{}", env!("CARGO_PKG_VERSION"))
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.scanner.pairs.is_empty() {
            return Err(ScanError::Config("scanner.pairs is empty".into()));
        }
        if self.scanner.batch_size == 0 {
            return Err(ScanError::Config("scanner.batch_size must be positive".into()));
        }
        if self.scanner.history_len < WINDOW {
            return Err(ScanError::Config(format!(
                "scanner.history_len must be at least {WINDOW}, got {}",
                self.scanner.history_len
            )));
        }
        if self.source.base_url.trim().is_empty() {
            return Err(ScanError::Config("source.base_url is empty".into()));
        }
        Ok(())
    }
}
