//! Result materialization for the query path.
//!
//! A data-producing query is never answered inline: its results are
//! materialized into a uniquely-named transient artifact with a retention
//! period, then streamed back through a transfer read session. This module
//! runs that pipeline and hands the controller a cursor plus the artifact
//! name to track for later cleanup.

use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cursor::ResultCursor;
use crate::error::{DriverError, Result};
use crate::poll::{self, PollOutcome};
use crate::service::{JobHandle, Services};
use crate::session::SessionProperties;
use crate::submit::{Submitter, Warning, SQL_TASK_NAME};

/// Generates a globally-unique, identifier-safe transient artifact name.
pub fn unique_artifact_name() -> String {
    format!("tmp_result_{}", Uuid::new_v4().simple())
}

/// Runs the query path: materialize into a transient artifact, read back
/// its schema, open a streaming read session.
pub struct Materializer<'a> {
    services: &'a Services,
    trace_base: &'a str,
    poll_interval: Duration,
}

impl<'a> Materializer<'a> {
    /// Creates a materializer over the given services.
    pub fn new(services: &'a Services, trace_base: &'a str, poll_interval: Duration) -> Self {
        Self {
            services,
            trace_base,
            poll_interval,
        }
    }

    /// Materializes the query and returns a cursor plus the artifact name.
    ///
    /// The submitted job handle is published into `job_slot` before polling
    /// so a concurrent cancel request can reach it; the trace-link warning
    /// is published into `warning_slot` right after submission so it
    /// survives a later failure. On any failure no artifact name is
    /// returned, so the controller never tracks a half-made artifact (the
    /// artifact itself may still exist server-side until its retention
    /// period expires).
    #[allow(clippy::too_many_arguments)]
    pub async fn materialize(
        &self,
        sql: &str,
        properties: &SessionProperties,
        lifecycle_days: u32,
        fetch_size: usize,
        max_rows: usize,
        job_slot: &Mutex<Option<JobHandle>>,
        warning_slot: &mut Option<Warning>,
        cancel: &CancellationToken,
    ) -> Result<(ResultCursor, String)> {
        let artifact = unique_artifact_name();
        let ddl = format!("create table {artifact} lifecycle {lifecycle_days} as {sql}");

        let submitter = Submitter::new(self.services.job.as_ref(), self.trace_base);
        let (handle, warning) = submitter.submit(&ddl, properties).await?;
        *warning_slot = Some(warning);
        *job_slot.lock().expect("job slot lock poisoned") = Some(handle.clone());

        let outcome = poll::await_terminal(
            self.services.job.as_ref(),
            &handle,
            SQL_TASK_NAME,
            self.poll_interval,
            cancel,
        )
        .await?;

        match outcome {
            PollOutcome::Success => {}
            PollOutcome::Failed(detail) => {
                return Err(DriverError::job_failed(format!(
                    "create transient artifact failed: {detail}"
                )));
            }
            PollOutcome::Cancelled => {
                return Err(DriverError::job_cancelled(
                    "create transient artifact cancelled",
                ));
            }
            PollOutcome::Interrupted => {
                return Err(DriverError::interrupted(
                    "materialization interrupted before completion",
                ));
            }
        }
        debug!("transient artifact {artifact} created");

        let schema = self.services.catalog.table_schema(&artifact).await?;
        debug!("read {} columns for {artifact}", schema.len());

        let session = self.services.transfer.open_read_session(&artifact).await?;
        info!("opened read session id={}", session.id());

        let cursor = ResultCursor::new(schema, session, fetch_size, max_rows);
        Ok((cursor, artifact))
    }
}
