//! Error types for jobsql.
//!
//! Defines the main error enum used throughout the driver. All remote and
//! transport failures are wrapped into one statement-level error type; the
//! variant records at which stage of an execution the failure occurred.

use thiserror::Error;

/// Main error type for driver operations.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The job service rejected a submission, or the transport failed at
    /// submit time (auth, quota, malformed job description).
    #[error("Submission error: {0}")]
    Submission(String),

    /// A status query failed with a hard transport/service error while
    /// waiting for a job to finish.
    #[error("Polling error: {0}")]
    Polling(String),

    /// The remote job reached the Failed status; carries the remote-supplied
    /// reason verbatim.
    #[error("Remote job failed: {0}")]
    JobFailed(String),

    /// The remote job reached the Cancelled status.
    #[error("Remote job cancelled: {0}")]
    JobCancelled(String),

    /// The catalog lookup for a materialized artifact failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A streaming read session could not be opened or failed mid-read.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Operation invoked on a closed statement, or an invalid argument such
    /// as a negative max-row bound.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The polling sleep was interrupted before the job reached a terminal
    /// status. The outcome of the job is unknown.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Configuration errors (invalid config file, bad endpoint URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DriverError {
    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Creates a polling error with the given message.
    pub fn polling(msg: impl Into<String>) -> Self {
        Self::Polling(msg.into())
    }

    /// Creates a remote-job-failure error with the given reason.
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Creates a remote-job-cancelled error with the given message.
    pub fn job_cancelled(msg: impl Into<String>) -> Self {
        Self::JobCancelled(msg.into())
    }

    /// Creates a schema error with the given message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a transfer error with the given message.
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    /// Creates an invalid-state error with the given message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates an interrupted error with the given message.
    pub fn interrupted(msg: impl Into<String>) -> Self {
        Self::Interrupted(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "Submission Error",
            Self::Polling(_) => "Polling Error",
            Self::JobFailed(_) => "Remote Job Failure",
            Self::JobCancelled(_) => "Remote Job Cancelled",
            Self::Schema(_) => "Schema Error",
            Self::Transfer(_) => "Transfer Error",
            Self::InvalidState(_) => "Invalid State",
            Self::Interrupted(_) => "Interrupted",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Result type alias using DriverError.
pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_submission() {
        let err = DriverError::submission("job description rejected");
        assert_eq!(err.to_string(), "Submission error: job description rejected");
        assert_eq!(err.category(), "Submission Error");
    }

    #[test]
    fn test_error_display_job_failed() {
        let err = DriverError::job_failed("out of memory");
        assert_eq!(err.to_string(), "Remote job failed: out of memory");
        assert_eq!(err.category(), "Remote Job Failure");
    }

    #[test]
    fn test_error_display_invalid_state() {
        let err = DriverError::invalid_state("the statement has been closed");
        assert_eq!(
            err.to_string(),
            "Invalid state: the statement has been closed"
        );
        assert_eq!(err.category(), "Invalid State");
    }

    #[test]
    fn test_error_display_interrupted() {
        let err = DriverError::interrupted("stopped before a terminal status");
        assert_eq!(
            err.to_string(),
            "Interrupted: stopped before a terminal status"
        );
        assert_eq!(err.category(), "Interrupted");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DriverError>();
    }
}
