//! Configuration management for jobsql.
//!
//! Handles loading driver configuration from TOML files and endpoint URLs:
//! where the job service lives, how long transient artifacts are retained,
//! how often job status is polled, and connection-level default session
//! properties.

use crate::error::{DriverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Re-export url for endpoint parsing
use url::Url;

/// Default retention period (in days) for transient result artifacts.
const DEFAULT_LIFECYCLE_DAYS: u32 = 3;

/// Default polling interval for job status, in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Default number of rows fetched per transfer batch.
const DEFAULT_FETCH_SIZE: usize = 10_000;

/// Driver configuration for one job-service connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Base URL of the job service.
    pub endpoint: String,

    /// Project/namespace jobs are submitted into, if the service requires one.
    #[serde(default)]
    pub project: Option<String>,

    /// Retention period (days) tagged onto transient result artifacts.
    #[serde(default = "default_lifecycle_days")]
    pub lifecycle_days: u32,

    /// Interval between job status probes, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Rows fetched per batch from a transfer read session.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// Host used to build execution-trace links. Defaults to the endpoint.
    #[serde(default)]
    pub trace_host: Option<String>,

    /// Connection-level default session properties. Statements receive a
    /// defensive copy at creation and never mutate this set.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

fn default_lifecycle_days() -> u32 {
    DEFAULT_LIFECYCLE_DAYS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_fetch_size() -> usize {
    DEFAULT_FETCH_SIZE
}

impl DriverConfig {
    /// Creates a config pointing at the given endpoint URL, with defaults for
    /// everything else.
    ///
    /// The endpoint must be an absolute `http` or `https` URL.
    pub fn from_endpoint(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| DriverError::config(format!("Invalid endpoint URL: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DriverError::config(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: None,
            lifecycle_days: DEFAULT_LIFECYCLE_DAYS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fetch_size: DEFAULT_FETCH_SIZE,
            trace_host: None,
            properties: HashMap::new(),
        })
    }

    /// Loads configuration from a TOML file at the given path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DriverError::config(format!("Cannot read config file {}: {e}", path.display()))
        })?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| DriverError::config(format!("Invalid config file: {e}")))?;

        // Validate the endpoint eagerly so misconfiguration fails at load
        // time, not at first submission.
        Self::from_endpoint(&config.endpoint)?;

        Ok(config)
    }

    /// Loads configuration from the platform config directory, if a config
    /// file exists there.
    pub fn load_default() -> Result<Option<Self>> {
        let Some(path) = Self::default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_path(&path).map(Some)
    }

    /// Returns the default config file path
    /// (`~/.config/jobsql/config.toml` on Linux).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jobsql").join("config.toml"))
    }

    /// The polling interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Base URL for execution-trace links.
    pub fn trace_base(&self) -> &str {
        self.trace_host.as_deref().unwrap_or(&self.endpoint)
    }
}
