//! Job submission.
//!
//! Builds a job description from a statement string plus the accumulated
//! session properties and submits it. The sub-task is named by a fixed
//! constant so the poller always knows which sub-task to query.

use tracing::{debug, info};

use crate::error::Result;
use crate::service::{JobHandle, JobService, JobSpec};
use crate::session::SessionProperties;

/// Fixed name of the SQL sub-task inside every submitted job.
pub const SQL_TASK_NAME: &str = "driver_sql_task";

/// The most recent diagnostic attached to a statement: a link to the remote
/// job's execution trace, replaced on each submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Human-readable diagnostic, typically a trace URL.
    pub message: String,
}

impl Warning {
    /// Creates a warning carrying the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Stateless submission helper bound to a job service and trace host.
pub struct Submitter<'a> {
    service: &'a dyn JobService,
    trace_base: &'a str,
}

impl<'a> Submitter<'a> {
    /// Creates a submitter.
    pub fn new(service: &'a dyn JobService, trace_base: &'a str) -> Self {
        Self {
            service,
            trace_base,
        }
    }

    /// Submits the statement with the given session properties.
    ///
    /// Returns the job handle together with the trace-link warning, which
    /// the caller records whether or not the job later succeeds.
    pub async fn submit(
        &self,
        sql: &str,
        properties: &SessionProperties,
    ) -> Result<(JobHandle, Warning)> {
        // If the client forgot to end with a semicolon, append one.
        let mut query = sql.to_string();
        if !query.contains(';') {
            query.push(';');
        }

        let settings = if properties.is_empty() {
            None
        } else {
            debug!("enabled session properties: {}", properties.to_json());
            Some(properties.to_json())
        };

        let spec = JobSpec {
            name: SQL_TASK_NAME.to_string(),
            query: query.clone(),
            settings,
        };

        let handle = self.service.submit(&spec).await?;

        let trace_url = trace_link(self.trace_base, &handle);
        debug!("run sql: {query}");
        info!("{trace_url}");

        Ok((handle, Warning::new(trace_url)))
    }
}

/// Builds the execution-trace URL for a submitted job.
fn trace_link(trace_base: &str, handle: &JobHandle) -> String {
    format!("{}/trace?job={}", trace_base.trim_end_matches('/'), handle.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockJobService;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_submit_appends_terminator() {
        let service = MockJobService::new();
        let submitter = Submitter::new(&service, "http://trace.local");

        submitter
            .submit("SELECT 1", &SessionProperties::new())
            .await
            .unwrap();

        assert_eq!(service.submitted()[0].query, "SELECT 1;");
    }

    #[tokio::test]
    async fn test_submit_keeps_existing_terminator() {
        let service = MockJobService::new();
        let submitter = Submitter::new(&service, "http://trace.local");

        submitter
            .submit("SELECT 1;", &SessionProperties::new())
            .await
            .unwrap();

        assert_eq!(service.submitted()[0].query, "SELECT 1;");
    }

    #[tokio::test]
    async fn test_settings_omitted_when_empty() {
        let service = MockJobService::new();
        let submitter = Submitter::new(&service, "http://trace.local");

        submitter
            .submit("SELECT 1", &SessionProperties::new())
            .await
            .unwrap();

        assert_eq!(service.submitted()[0].settings, None);
    }

    #[tokio::test]
    async fn test_settings_serialized_when_present() {
        let service = MockJobService::new();
        let submitter = Submitter::new(&service, "http://trace.local");

        let mut props = SessionProperties::new();
        props.set("engine.sql.x", "1");
        submitter.submit("SELECT 1", &props).await.unwrap();

        let settings = service.submitted()[0].settings.clone().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&settings).unwrap();
        assert_eq!(parsed["engine.sql.x"], "1");
    }

    #[tokio::test]
    async fn test_task_name_is_fixed() {
        let service = MockJobService::new();
        let submitter = Submitter::new(&service, "http://trace.local");

        submitter
            .submit("DROP TABLE t", &SessionProperties::new())
            .await
            .unwrap();

        assert_eq!(service.submitted()[0].name, SQL_TASK_NAME);
    }

    #[tokio::test]
    async fn test_trace_warning_returned() {
        let service = MockJobService::new();
        let submitter = Submitter::new(&service, "http://trace.local/");

        let (handle, warning) = submitter
            .submit("SELECT 1", &SessionProperties::new())
            .await
            .unwrap();

        assert_eq!(
            warning.message,
            format!("http://trace.local/trace?job={}", handle.id)
        );
    }

    #[tokio::test]
    async fn test_submit_failure_surfaces() {
        let service = MockJobService::new().failing_submit();
        let submitter = Submitter::new(&service, "http://trace.local");

        let err = submitter
            .submit("SELECT 1", &SessionProperties::new())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Submission Error");
    }
}
