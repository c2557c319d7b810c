//! The statement execution controller.
//!
//! Owns all mutable cross-call state for one statement: the current job
//! handle, the current result cursor, the tracked transient artifact, the
//! accumulated update count and the warning chain. Every execute call
//! first tears the previous execution fully down, so no two transient
//! artifacts are ever live for the same statement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::{classify, StatementKind};
use crate::config::DriverConfig;
use crate::cursor::ResultCursor;
use crate::error::{DriverError, Result};
use crate::materialize::Materializer;
use crate::poll::{self, PollOutcome};
use crate::service::{JobHandle, JobService, Services};
use crate::session::SessionProperties;
use crate::submit::{Submitter, Warning, SQL_TASK_NAME};

/// Per-execution state of a statement.
///
/// A single tagged variant instead of scattered nullable fields, so a
/// statement can never hold, say, both a cursor and an unconsumed update
/// count.
pub enum ExecutionState {
    /// No execution outcome is held.
    Idle,
    /// The last execution was a query; the cursor and its backing transient
    /// artifact are live.
    ResultReady {
        cursor: ResultCursor,
        artifact: String,
    },
    /// The last execution was an update; the count is read at most once.
    UpdateReady { count: i64, consumed: bool },
}

/// Suggested fetch direction for result cursors. The forward-only cursor
/// is free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchDirection {
    Forward,
    Reverse,
    #[default]
    Unknown,
}

/// A statement bound to one connection.
///
/// Methods are meant to be driven from one caller context at a time; only
/// cancellation (via [`Statement::cancel_handle`]) is safe to issue from a
/// second task while an execution is in flight.
pub struct Statement {
    services: Services,
    trace_base: String,
    lifecycle_days: u32,
    poll_interval: Duration,

    properties: SessionProperties,
    state: ExecutionState,
    warning: Option<Warning>,

    // Shared with CancelHandle.
    job: Arc<Mutex<Option<JobHandle>>>,
    cancelled: Arc<AtomicBool>,
    interrupt: Arc<Mutex<CancellationToken>>,
    closed: Arc<AtomicBool>,

    max_rows: usize,
    fetch_size: usize,
    fetch_direction: FetchDirection,
    scrollable: bool,
}

impl Statement {
    /// Creates a statement. `defaults` is the connection-level property set;
    /// the statement keeps its own copy.
    pub fn new(
        services: Services,
        config: &DriverConfig,
        defaults: SessionProperties,
        scrollable: bool,
    ) -> Self {
        Self {
            trace_base: config.trace_base().to_string(),
            lifecycle_days: config.lifecycle_days,
            poll_interval: config.poll_interval(),
            fetch_size: config.fetch_size,
            services,
            properties: defaults,
            state: ExecutionState::Idle,
            warning: None,
            job: Arc::new(Mutex::new(None)),
            cancelled: Arc::new(AtomicBool::new(false)),
            interrupt: Arc::new(Mutex::new(CancellationToken::new())),
            closed: Arc::new(AtomicBool::new(false)),
            max_rows: 0,
            fetch_direction: FetchDirection::Unknown,
            scrollable,
        }
    }

    /// Executes a data-producing query, materializing its results and
    /// returning a cursor over them.
    pub async fn execute_query(&mut self, sql: &str) -> Result<&mut ResultCursor> {
        self.check_closed()?;
        self.reset().await;

        let started = std::time::Instant::now();
        let token = self.current_token();
        let materializer =
            Materializer::new(&self.services, &self.trace_base, self.poll_interval);
        let (cursor, artifact) = materializer
            .materialize(
                sql,
                &self.properties,
                self.lifecycle_days,
                self.fetch_size,
                self.max_rows,
                &self.job,
                &mut self.warning,
                &token,
            )
            .await?;

        debug!("query materialized in {} ms", started.elapsed().as_millis());
        self.state = ExecutionState::ResultReady { cursor, artifact };
        match &mut self.state {
            ExecutionState::ResultReady { cursor, .. } => Ok(cursor),
            _ => unreachable!("state set to ResultReady above"),
        }
    }

    /// Executes a mutating statement and returns the row-affected count.
    pub async fn execute_update(&mut self, sql: &str) -> Result<i64> {
        self.check_closed()?;
        self.reset().await;

        let started = std::time::Instant::now();
        let token = self.current_token();
        let submitter = Submitter::new(self.services.job.as_ref(), &self.trace_base);
        let (handle, warning) = submitter.submit(sql, &self.properties).await?;
        self.warning = Some(warning);
        *self.job.lock().expect("job slot lock poisoned") = Some(handle.clone());

        let outcome = poll::await_terminal(
            self.services.job.as_ref(),
            &handle,
            SQL_TASK_NAME,
            self.poll_interval,
            &token,
        )
        .await?;

        match outcome {
            PollOutcome::Success => {}
            PollOutcome::Failed(detail) => return Err(DriverError::job_failed(detail)),
            PollOutcome::Cancelled => {
                return Err(DriverError::job_cancelled("update statement cancelled"))
            }
            PollOutcome::Interrupted => {
                return Err(DriverError::interrupted(
                    "update interrupted before completion",
                ))
            }
        }

        let count = match self
            .services
            .job
            .task_summary(&handle, SQL_TASK_NAME)
            .await?
        {
            Some(json) => update_count_from_summary(&json),
            None => 0,
        };

        self.state = ExecutionState::UpdateReady {
            count,
            consumed: false,
        };
        debug!("update resolved in {} ms", started.elapsed().as_millis());
        info!("successfully updated {count} records");
        Ok(count)
    }

    /// Executes an arbitrary statement.
    ///
    /// Property directives are applied to the session without submitting a
    /// job. Returns true if the execution produced a result set.
    pub async fn execute(&mut self, sql: &str) -> Result<bool> {
        self.check_closed()?;

        match classify(sql) {
            StatementKind::PropertyDirective { key, value } => {
                debug!("set session property: {key}={value}");
                self.properties.set(key, value);
                Ok(false)
            }
            StatementKind::Query => {
                self.execute_query(sql).await?;
                Ok(true)
            }
            StatementKind::Update => {
                self.execute_update(sql).await?;
                Ok(false)
            }
        }
    }

    /// Requests termination of the in-flight job, if any.
    ///
    /// No-op when already cancelled or when no job is in flight. This only
    /// sets the cancelled flag and issues the remote stop request; the poll
    /// loop resolves on its own when it observes the Cancelled status.
    pub async fn cancel(&self) -> Result<()> {
        self.check_closed()?;
        cancel_shared(
            self.services.job.as_ref(),
            &self.job,
            &self.cancelled,
        )
        .await
    }

    /// Returns a handle that can cancel or interrupt this statement from
    /// another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            service: self.services.job.clone(),
            job: self.job.clone(),
            cancelled: self.cancelled.clone(),
            interrupt: self.interrupt.clone(),
            closed: self.closed.clone(),
        }
    }

    /// Closes the statement: closes any open cursor, drops any tracked
    /// transient artifact (best-effort), releases the job handle and marks
    /// the statement closed. Idempotent; never raises.
    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }

        if let ExecutionState::ResultReady { mut cursor, artifact } =
            std::mem::replace(&mut self.state, ExecutionState::Idle)
        {
            cursor.close();
            self.drop_artifact(&artifact).await;
        }

        *self.job.lock().expect("job slot lock poisoned") = None;
        self.closed.store(true, Ordering::SeqCst);
        debug!("the statement has been closed");
    }

    /// Returns true once the statement has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// One-shot update count: the first call after a successful update
    /// returns the count; every further call (until the next execute)
    /// returns -1, signaling no more results.
    pub fn update_count(&mut self) -> Result<i64> {
        self.check_closed()?;
        match &mut self.state {
            ExecutionState::UpdateReady { count, consumed } => {
                if *consumed {
                    Ok(-1)
                } else {
                    *consumed = true;
                    Ok(*count)
                }
            }
            _ => Ok(-1),
        }
    }

    /// The cursor of the last query execution, if one is live.
    pub fn result_cursor(&mut self) -> Option<&mut ResultCursor> {
        match &mut self.state {
            ExecutionState::ResultReady { cursor, .. } => Some(cursor),
            _ => None,
        }
    }

    /// The transient artifact currently tracked, if any.
    pub fn current_artifact(&self) -> Option<&str> {
        match &self.state {
            ExecutionState::ResultReady { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    /// There is never more than one result per execution.
    pub fn more_results(&mut self) -> Result<bool> {
        self.check_closed()?;
        Ok(false)
    }

    /// The most recent diagnostic (execution-trace link), if any.
    pub fn warnings(&self) -> Option<&Warning> {
        self.warning.as_ref()
    }

    /// Clears the warning chain.
    pub fn clear_warnings(&mut self) {
        self.warning = None;
    }

    /// The session property overrides accumulated so far.
    pub fn session_properties(&self) -> &SessionProperties {
        &self.properties
    }

    /// Caps the number of rows a query result delivers. 0 means unlimited.
    pub fn set_max_rows(&mut self, max: i64) -> Result<()> {
        self.check_closed()?;
        if max < 0 {
            return Err(DriverError::invalid_state("max rows must be >= 0"));
        }
        self.max_rows = max as usize;
        Ok(())
    }

    /// The current max-row bound.
    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Sets the number of rows fetched per transfer batch.
    pub fn set_fetch_size(&mut self, rows: usize) -> Result<()> {
        self.check_closed()?;
        self.fetch_size = rows;
        Ok(())
    }

    /// The current fetch size.
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Suggests a fetch direction for subsequent cursors.
    pub fn set_fetch_direction(&mut self, direction: FetchDirection) -> Result<()> {
        self.check_closed()?;
        self.fetch_direction = direction;
        Ok(())
    }

    /// The suggested fetch direction.
    pub fn fetch_direction(&self) -> FetchDirection {
        self.fetch_direction
    }

    /// Whether the caller asked for a scrollable result set. Cursors are
    /// forward-only regardless; the preference is only recorded.
    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    fn check_closed(&self) -> Result<()> {
        if self.is_closed() {
            Err(DriverError::invalid_state("the statement has been closed"))
        } else {
            Ok(())
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.interrupt
            .lock()
            .expect("interrupt lock poisoned")
            .clone()
    }

    /// Tears down the previous execution before a new one starts: closes
    /// the cursor, drops the transient artifact, clears the job handle and
    /// the cancellation flag, and installs a fresh interrupt token.
    async fn reset(&mut self) {
        if let ExecutionState::ResultReady { mut cursor, artifact } =
            std::mem::replace(&mut self.state, ExecutionState::Idle)
        {
            cursor.close();
            self.drop_artifact(&artifact).await;
        }

        *self.job.lock().expect("job slot lock poisoned") = None;
        self.cancelled.store(false, Ordering::SeqCst);
        *self.interrupt.lock().expect("interrupt lock poisoned") = CancellationToken::new();
    }

    /// Drops a transient artifact. Best-effort: failures are logged and
    /// swallowed so cleanup can never mask a primary error or block
    /// progress.
    async fn drop_artifact(&self, artifact: &str) {
        let submitter = Submitter::new(self.services.job.as_ref(), &self.trace_base);
        let sql = format!("drop table if exists {artifact};");

        match submitter.submit(&sql, &self.properties).await {
            Ok((handle, _)) => {
                let outcome = poll::await_terminal(
                    self.services.job.as_ref(),
                    &handle,
                    SQL_TASK_NAME,
                    self.poll_interval,
                    &CancellationToken::new(),
                )
                .await;
                match outcome {
                    Ok(PollOutcome::Success) => {
                        debug!("silently dropped transient artifact {artifact}");
                    }
                    Ok(other) => {
                        warn!("drop of transient artifact {artifact} resolved as {other:?}");
                    }
                    Err(e) => warn!("failed to drop transient artifact {artifact}: {e}"),
                }
            }
            Err(e) => warn!("failed to drop transient artifact {artifact}: {e}"),
        }
    }
}

/// Cancellation handle detached from the statement's borrow, so a second
/// task can cancel or interrupt while an execute call is in flight.
#[derive(Clone)]
pub struct CancelHandle {
    service: Arc<dyn JobService>,
    job: Arc<Mutex<Option<JobHandle>>>,
    cancelled: Arc<AtomicBool>,
    interrupt: Arc<Mutex<CancellationToken>>,
    closed: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests termination of the in-flight job, if any. Same semantics
    /// as [`Statement::cancel`].
    pub async fn cancel(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::invalid_state("the statement has been closed"));
        }
        cancel_shared(self.service.as_ref(), &self.job, &self.cancelled).await
    }

    /// Interrupts the poll loop's sleep. The in-flight execute call
    /// unwinds with an interrupted error; the remote job keeps running.
    pub fn interrupt(&self) {
        self.interrupt
            .lock()
            .expect("interrupt lock poisoned")
            .cancel();
    }
}

async fn cancel_shared(
    service: &dyn JobService,
    job: &Mutex<Option<JobHandle>>,
    cancelled: &AtomicBool,
) -> Result<()> {
    if cancelled.load(Ordering::SeqCst) {
        return Ok(());
    }
    let handle = job.lock().expect("job slot lock poisoned").clone();
    let Some(handle) = handle else {
        return Ok(());
    };

    service.stop(&handle).await?;
    debug!("submitted cancel to job id={}", handle.id);
    cancelled.store(true, Ordering::SeqCst);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct SummaryDoc {
    #[serde(default, rename = "Outputs")]
    outputs: HashMap<String, Vec<i64>>,
}

/// Sums the first element of every output-partition array in the job's
/// structured summary. Absent, empty or unparseable summaries count as 0.
fn update_count_from_summary(json: &str) -> i64 {
    match serde_json::from_str::<SummaryDoc>(json) {
        Ok(doc) => doc
            .outputs
            .values()
            .filter_map(|counts| counts.first())
            .sum(),
        Err(e) => {
            warn!("unparseable task summary: {e}");
            0
        }
    }
}
