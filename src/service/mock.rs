//! Mock service implementations for testing.
//!
//! `MockJobService` plays back a scripted sequence of status probes so
//! tests can drive the poll loop through arbitrary state sequences without
//! a remote service. Submissions and stop requests are recorded for
//! assertion.

use super::{
    CatalogService, ColumnInfo, JobHandle, JobService, JobSpec, ReadSession, Row, TransferService,
};
use crate::error::{DriverError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A job service that replays a scripted status sequence.
///
/// Each `task_status` call pops the front of the script; `None` entries
/// model the "status not visible yet" race. Once the script is exhausted,
/// every probe answers `Success`, so follow-up jobs (e.g. artifact drops)
/// complete without extra scripting.
pub struct MockJobService {
    statuses: Mutex<VecDeque<Option<super::TaskStatus>>>,
    task_result: Mutex<String>,
    summary: Mutex<Option<String>>,
    submitted: Mutex<Vec<JobSpec>>,
    stopped: Mutex<Vec<String>>,
    fail_submit: bool,
    fail_status: bool,
    fail_result: bool,
    next_id: AtomicU64,
}

impl MockJobService {
    /// Creates a mock where every job succeeds immediately.
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            task_result: Mutex::new(String::new()),
            summary: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            fail_submit: false,
            fail_status: false,
            fail_result: false,
            next_id: AtomicU64::new(1),
        }
    }

    /// Scripts the status sequence returned by successive probes.
    pub fn with_statuses(
        mut self,
        statuses: impl IntoIterator<Item = Option<super::TaskStatus>>,
    ) -> Self {
        self.statuses = Mutex::new(statuses.into_iter().collect());
        self
    }

    /// Sets the detail string returned by `task_result`.
    pub fn with_task_result(self, detail: impl Into<String>) -> Self {
        *self.task_result.lock().expect("lock poisoned") = detail.into();
        self
    }

    /// Sets the raw JSON summary returned by `task_summary`.
    pub fn with_summary(self, json: impl Into<String>) -> Self {
        *self.summary.lock().expect("lock poisoned") = Some(json.into());
        self
    }

    /// Makes every submission fail.
    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    /// Makes every status probe fail with a hard transport error.
    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    /// Makes the failure-detail fetch fail.
    pub fn failing_result(mut self) -> Self {
        self.fail_result = true;
        self
    }

    /// All job specs submitted so far, in order.
    pub fn submitted(&self) -> Vec<JobSpec> {
        self.submitted.lock().expect("lock poisoned").clone()
    }

    /// Ids of all jobs a stop was requested for, in order.
    pub fn stop_requests(&self) -> Vec<String> {
        self.stopped.lock().expect("lock poisoned").clone()
    }
}

impl Default for MockJobService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobService for MockJobService {
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle> {
        if self.fail_submit {
            return Err(DriverError::submission(
                "job service rejected the submission",
            ));
        }
        self.submitted.lock().expect("lock poisoned").push(spec.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle::new(format!("mock_job_{n}")))
    }

    async fn task_status(
        &self,
        _job: &JobHandle,
        _task: &str,
    ) -> Result<Option<super::TaskStatus>> {
        if self.fail_status {
            return Err(DriverError::polling("status service unreachable"));
        }
        let mut script = self.statuses.lock().expect("lock poisoned");
        Ok(script.pop_front().unwrap_or(Some(super::TaskStatus::Success)))
    }

    async fn task_result(&self, _job: &JobHandle, _task: &str) -> Result<String> {
        if self.fail_result {
            return Err(DriverError::polling("result fetch failed"));
        }
        Ok(self.task_result.lock().expect("lock poisoned").clone())
    }

    async fn task_summary(&self, _job: &JobHandle, _task: &str) -> Result<Option<String>> {
        Ok(self.summary.lock().expect("lock poisoned").clone())
    }

    async fn stop(&self, job: &JobHandle) -> Result<()> {
        self.stopped.lock().expect("lock poisoned").push(job.id.clone());
        Ok(())
    }

    async fn wait_for_completion(&self, _job: &JobHandle, _poll_interval: Duration) -> Result<()> {
        Ok(())
    }
}

/// A catalog that returns a canned column schema for every artifact.
pub struct MockCatalogService {
    columns: Vec<ColumnInfo>,
    fail: bool,
    requests: Mutex<Vec<String>>,
}

impl MockCatalogService {
    /// Creates a catalog answering with the given columns.
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a catalog whose lookups always fail.
    pub fn failing() -> Self {
        Self {
            columns: Vec::new(),
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Artifact names looked up so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl CatalogService for MockCatalogService {
    async fn table_schema(&self, artifact: &str) -> Result<Vec<ColumnInfo>> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(artifact.to_string());
        if self.fail {
            return Err(DriverError::schema(format!(
                "artifact '{artifact}' not found in catalog"
            )));
        }
        Ok(self.columns.clone())
    }
}

/// A transfer service that streams canned rows.
pub struct MockTransferService {
    rows: Vec<Row>,
    fail: bool,
    opened: Mutex<Vec<String>>,
}

impl MockTransferService {
    /// Creates a transfer service whose sessions yield the given rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            fail: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Creates a transfer service whose session opens always fail.
    pub fn failing() -> Self {
        Self {
            rows: Vec::new(),
            fail: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Artifact names sessions were opened against.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl TransferService for MockTransferService {
    async fn open_read_session(&self, artifact: &str) -> Result<Box<dyn ReadSession>> {
        self.opened
            .lock()
            .expect("lock poisoned")
            .push(artifact.to_string());
        if self.fail {
            return Err(DriverError::transfer(format!(
                "cannot open read session for '{artifact}'"
            )));
        }
        Ok(Box::new(MockReadSession {
            id: format!("mock_session_{artifact}"),
            rows: self.rows.clone().into(),
        }))
    }
}

struct MockReadSession {
    id: String,
    rows: VecDeque<Row>,
}

#[async_trait]
impl ReadSession for MockReadSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_batch(&mut self, max: usize) -> Result<Vec<Row>> {
        let take = max.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::TaskStatus;
    use super::*;
    use crate::service::Value;

    #[tokio::test]
    async fn test_scripted_statuses_then_success() {
        let service =
            MockJobService::new().with_statuses([None, Some(TaskStatus::Running)]);
        let handle = JobHandle::new("j1");

        assert_eq!(service.task_status(&handle, "t").await.unwrap(), None);
        assert_eq!(
            service.task_status(&handle, "t").await.unwrap(),
            Some(TaskStatus::Running)
        );
        // Script exhausted: everything succeeds from here on.
        assert_eq!(
            service.task_status(&handle, "t").await.unwrap(),
            Some(TaskStatus::Success)
        );
    }

    #[tokio::test]
    async fn test_submissions_recorded() {
        let service = MockJobService::new();
        let spec = JobSpec {
            name: "t".to_string(),
            query: "SELECT 1;".to_string(),
            settings: None,
        };
        let handle = service.submit(&spec).await.unwrap();
        assert_eq!(handle.id, "mock_job_1");
        assert_eq!(service.submitted(), vec![spec]);
    }

    #[tokio::test]
    async fn test_read_session_batches() {
        let rows: Vec<Row> = vec![
            vec![Value::Int(1)],
            vec![Value::Int(2)],
            vec![Value::Int(3)],
        ];
        let transfer = MockTransferService::new(rows);
        let mut session = transfer.open_read_session("a").await.unwrap();

        assert_eq!(session.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(session.next_batch(2).await.unwrap().len(), 1);
        assert!(session.next_batch(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_catalog() {
        let catalog = MockCatalogService::failing();
        let err = catalog.table_schema("a").await.unwrap_err();
        assert_eq!(err.category(), "Schema Error");
    }
}
