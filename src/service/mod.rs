//! External service interfaces.
//!
//! The driver talks to three remote collaborators, each behind a trait so
//! backends can be swapped (and mocked in tests): the job-submission
//! service, the artifact/schema catalog, and the bulk-transfer service.

mod http;
mod mock;
mod types;

pub use http::HttpJobClient;
pub use mock::{MockCatalogService, MockJobService, MockTransferService};
pub use types::{ColumnInfo, Row, Value};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Status of a named sub-task within a job.
///
/// Waiting, Running and Suspended are non-terminal; Success, Failed and
/// Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    Waiting,
    Running,
    Suspended,
    Success,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Returns true if no further status transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Parses a status from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Some(Self::Waiting),
            "running" => Some(Self::Running),
            "suspended" => Some(Self::Suspended),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Description of a job to submit: one named SQL sub-task plus optional
/// serialized session settings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobSpec {
    /// Name of the SQL sub-task within the job.
    pub name: String,

    /// The statement text, terminator included.
    pub query: String,

    /// Session properties serialized as a single JSON value; omitted when
    /// no properties are set.
    pub settings: Option<String>,
}

/// Opaque handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Service-assigned job identifier.
    pub id: String,
}

impl JobHandle {
    /// Creates a handle from a service-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The remote job-submission service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submits a job, returning its handle.
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle>;

    /// Queries the status of a named sub-task.
    ///
    /// Returns `Ok(None)` when the sub-task's status is not visible yet
    /// (the race between submission and status availability); callers keep
    /// polling. A returned error is a hard transport/service failure.
    async fn task_status(&self, job: &JobHandle, task: &str) -> Result<Option<TaskStatus>>;

    /// Fetches the result detail of a sub-task (e.g. the failure reason).
    async fn task_result(&self, job: &JobHandle, task: &str) -> Result<String>;

    /// Fetches the structured summary of a sub-task as raw JSON, if the
    /// service produced one.
    async fn task_summary(&self, job: &JobHandle, task: &str) -> Result<Option<String>>;

    /// Requests termination of the whole job. Best-effort; may race with a
    /// concurrently-arriving Success status.
    async fn stop(&self, job: &JobHandle) -> Result<()>;

    /// Blocks until the job itself (not just the sub-task) has completed,
    /// covering post-task finalization steps.
    async fn wait_for_completion(&self, job: &JobHandle, poll_interval: Duration) -> Result<()>;
}

/// The artifact/schema catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns the ordered column schema of a named artifact.
    async fn table_schema(&self, artifact: &str) -> Result<Vec<ColumnInfo>>;
}

/// A streaming read channel opened against a named artifact.
#[async_trait]
pub trait ReadSession: Send {
    /// Service-assigned session identifier.
    fn id(&self) -> &str;

    /// Reads the next batch of rows, at most `max` of them. An empty batch
    /// signals the end of the stream.
    async fn next_batch(&mut self, max: usize) -> Result<Vec<Row>>;
}

/// The bulk-data transfer service.
#[async_trait]
pub trait TransferService: Send + Sync {
    /// Opens a streaming read session over the rows of a named artifact.
    async fn open_read_session(&self, artifact: &str) -> Result<Box<dyn ReadSession>>;
}

/// Shared handles to the three remote services a connection talks to.
#[derive(Clone)]
pub struct Services {
    pub job: Arc<dyn JobService>,
    pub catalog: Arc<dyn CatalogService>,
    pub transfer: Arc<dyn TransferService>,
}

impl Services {
    /// Bundles the three service handles.
    pub fn new(
        job: Arc<dyn JobService>,
        catalog: Arc<dyn CatalogService>,
        transfer: Arc<dyn TransferService>,
    ) -> Self {
        Self {
            job,
            catalog,
            transfer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Waiting.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Suspended.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TaskStatus::parse("Running"), Some(TaskStatus::Running));
        assert_eq!(TaskStatus::parse("SUCCESS"), Some(TaskStatus::Success));
        assert_eq!(TaskStatus::parse("canceled"), Some(TaskStatus::Cancelled));
        assert_eq!(TaskStatus::parse("bogus"), None);
    }
}
