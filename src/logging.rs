//! Logging initialization.
//!
//! The driver is a library, so it never installs a subscriber on its own;
//! host applications opt in through [`init`]. Verbosity is controlled with
//! `RUST_LOG` via `EnvFilter`, defaulting to `info`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::error::{DriverError, Result};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Log to stderr, for command-line hosts and test harnesses.
    Stderr,
    /// Append to the log file under the platform state directory
    /// (`~/.local/state/jobsql/jobsql.log` on Linux).
    File,
}

/// Installs the global tracing subscriber for the given target.
///
/// Fails if the log file cannot be opened or if a subscriber is already
/// installed.
pub fn init(target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File => {
            let file = open_log_file(&log_path())?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .try_init()
        }
    }
    .map_err(|e| DriverError::config(format!("Failed to install logging subscriber: {e}")))
}

/// The log file location: the platform state directory, falling back to the
/// config directory, then the temp directory.
pub fn log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("jobsql").join("jobsql.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("jobsql.log"))
}

/// Opens the log file in append mode, creating parent directories as
/// needed. Appending keeps earlier sessions of a long-lived host visible.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DriverError::config(format!(
                "Cannot create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DriverError::config(format!("Cannot open log file {}: {e}", path.display())))
}
