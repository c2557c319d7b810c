//! REST-backed service client.
//!
//! Implements all three service traits against a job service speaking a
//! plain JSON-over-HTTP protocol. One client instance can be shared (via
//! `Arc`) as the job, catalog and transfer handle of a connection.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    CatalogService, ColumnInfo, JobHandle, JobService, JobSpec, ReadSession, Row, TaskStatus,
    TransferService, Value,
};
use crate::error::{DriverError, Result};

/// Default timeout for individual API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// REST client for the job service and its catalog/transfer endpoints.
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    name: &'a str,
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Deserialize)]
struct TaskResultResponse {
    result: String,
}

#[derive(Deserialize)]
struct TaskSummaryResponse {
    summary: String,
}

#[derive(Deserialize)]
struct SchemaResponse {
    columns: Vec<ColumnInfo>,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
}

#[derive(Deserialize)]
struct RowsResponse {
    rows: Vec<Vec<serde_json::Value>>,
}

impl HttpJobClient {
    /// Creates a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DriverError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(context: &str, e: reqwest::Error) -> String {
        if e.is_timeout() {
            format!("{context}: request timed out")
        } else if e.is_connect() {
            format!("{context}: cannot connect to the job service")
        } else {
            format!("{context}: {e}")
        }
    }

    async fn read_body(response: reqwest::Response, context: &str) -> Result<(StatusCode, String)> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriverError::polling(format!("{context}: failed to read response: {e}")))?;
        Ok((status, body))
    }
}

#[async_trait]
impl JobService for HttpJobClient {
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle> {
        let request = SubmitRequest {
            name: &spec.name,
            query: &spec.query,
            settings: spec.settings.as_deref(),
        };

        let response = self
            .client
            .post(self.url("/api/jobs"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DriverError::submission(Self::transport_error("submit", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriverError::submission(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(DriverError::submission(format!(
                "job service returned {status}: {body}"
            )));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::submission(format!("malformed submit response: {e}")))?;
        Ok(JobHandle::new(parsed.id))
    }

    async fn task_status(&self, job: &JobHandle, task: &str) -> Result<Option<TaskStatus>> {
        let url = self.url(&format!("/api/jobs/{}/tasks/{}/status", job.id, task));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DriverError::polling(Self::transport_error("task status", e)))?;

        // The sub-task may not be visible right after submission.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let (status, body) = Self::read_body(response, "task status").await?;
        if !status.is_success() {
            return Err(DriverError::polling(format!(
                "status service returned {status}: {body}"
            )));
        }

        let parsed: StatusResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::polling(format!("malformed status response: {e}")))?;
        let task_status = TaskStatus::parse(&parsed.status).ok_or_else(|| {
            DriverError::polling(format!("unknown task status '{}'", parsed.status))
        })?;
        Ok(Some(task_status))
    }

    async fn task_result(&self, job: &JobHandle, task: &str) -> Result<String> {
        let url = self.url(&format!("/api/jobs/{}/tasks/{}/result", job.id, task));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DriverError::polling(Self::transport_error("task result", e)))?;

        let (status, body) = Self::read_body(response, "task result").await?;
        if !status.is_success() {
            return Err(DriverError::polling(format!(
                "result fetch returned {status}: {body}"
            )));
        }

        let parsed: TaskResultResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::polling(format!("malformed result response: {e}")))?;
        Ok(parsed.result)
    }

    async fn task_summary(&self, job: &JobHandle, task: &str) -> Result<Option<String>> {
        let url = self.url(&format!("/api/jobs/{}/tasks/{}/summary", job.id, task));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DriverError::polling(Self::transport_error("task summary", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let (status, body) = Self::read_body(response, "task summary").await?;
        if !status.is_success() {
            return Err(DriverError::polling(format!(
                "summary fetch returned {status}: {body}"
            )));
        }

        let parsed: TaskSummaryResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::polling(format!("malformed summary response: {e}")))?;
        Ok(Some(parsed.summary))
    }

    async fn stop(&self, job: &JobHandle) -> Result<()> {
        let url = self.url(&format!("/api/jobs/{}/stop", job.id));
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| DriverError::submission(Self::transport_error("stop", e)))?;

        if !response.status().is_success() {
            return Err(DriverError::submission(format!(
                "stop request returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn wait_for_completion(&self, job: &JobHandle, poll_interval: Duration) -> Result<()> {
        // Confirms the job as a whole is done, covering finalization steps
        // that run after the SQL sub-task reports Success.
        loop {
            let url = self.url(&format!("/api/jobs/{}/status", job.id));
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| DriverError::polling(Self::transport_error("job status", e)))?;

            let (status, body) = Self::read_body(response, "job status").await?;
            if !status.is_success() {
                return Err(DriverError::polling(format!(
                    "job status returned {status}: {body}"
                )));
            }

            let parsed: StatusResponse = serde_json::from_str(&body)
                .map_err(|e| DriverError::polling(format!("malformed status response: {e}")))?;
            if let Some(s) = TaskStatus::parse(&parsed.status) {
                if s.is_terminal() {
                    return Ok(());
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[async_trait]
impl CatalogService for HttpJobClient {
    async fn table_schema(&self, artifact: &str) -> Result<Vec<ColumnInfo>> {
        let url = self.url(&format!("/api/artifacts/{artifact}/schema"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DriverError::schema(Self::transport_error("schema lookup", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriverError::schema(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(DriverError::schema(format!(
                "catalog returned {status}: {body}"
            )));
        }

        let parsed: SchemaResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::schema(format!("malformed schema response: {e}")))?;
        Ok(parsed.columns)
    }
}

#[async_trait]
impl TransferService for HttpJobClient {
    async fn open_read_session(&self, artifact: &str) -> Result<Box<dyn ReadSession>> {
        let url = self.url(&format!("/api/artifacts/{artifact}/sessions"));
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| DriverError::transfer(Self::transport_error("open session", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriverError::transfer(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(DriverError::transfer(format!(
                "transfer service returned {status}: {body}"
            )));
        }

        let parsed: SessionResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::transfer(format!("malformed session response: {e}")))?;

        Ok(Box::new(HttpReadSession {
            id: parsed.id,
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            offset: 0,
            finished: false,
        }))
    }
}

/// Streaming read session backed by paged row fetches.
struct HttpReadSession {
    id: String,
    base_url: String,
    client: Client,
    offset: usize,
    finished: bool,
}

#[async_trait]
impl ReadSession for HttpReadSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_batch(&mut self, max: usize) -> Result<Vec<Row>> {
        if self.finished || max == 0 {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/api/sessions/{}/rows?offset={}&count={}",
            self.base_url, self.id, self.offset, max
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DriverError::transfer(HttpJobClient::transport_error("read rows", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriverError::transfer(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(DriverError::transfer(format!(
                "row fetch returned {status}: {body}"
            )));
        }

        let parsed: RowsResponse = serde_json::from_str(&body)
            .map_err(|e| DriverError::transfer(format!("malformed rows response: {e}")))?;

        let rows: Vec<Row> = parsed
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(value_from_json).collect())
            .collect();

        self.offset += rows.len();
        if rows.len() < max {
            self.finished = true;
        }
        Ok(rows)
    }
}

/// Maps a wire JSON value onto the driver's value type.
fn value_from_json(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        // Nested structures are delivered as their JSON text.
        other => Value::String(other.to_string()),
    }
}
