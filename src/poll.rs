//! Job status polling.
//!
//! Blocks the calling task at a fixed interval until the named sub-task
//! reaches a terminal status, the status service fails hard, or the wait is
//! interrupted through a cancellation token. Interruption is a distinct
//! outcome: callers can never mistake "stopped early" for success.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::service::{JobHandle, JobService, TaskStatus};

/// Resolution of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The sub-task succeeded and the job as a whole completed.
    Success,
    /// The sub-task failed; carries the remote-supplied reason. When the
    /// detail fetch itself fails, the detail embeds that secondary error so
    /// neither fact is lost.
    Failed(String),
    /// The sub-task was cancelled remotely (or a client-initiated cancel
    /// took effect).
    Cancelled,
    /// The wait was interrupted before a terminal status was observed. The
    /// job's outcome is unknown.
    Interrupted,
}

/// Polls the named sub-task until it resolves.
///
/// Sleeps `interval` between probes (and once before the first probe, since
/// a just-submitted job is never terminal). A probe answering "no status
/// yet" keeps the loop going; a probe failing with a transport error aborts
/// it immediately with a polling error. After observing Success, a final
/// blocking wait against the job handle itself confirms completion.
pub async fn await_terminal(
    service: &dyn JobService,
    job: &JobHandle,
    task: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<PollOutcome> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("poll loop interrupted for job id={}", job.id);
                return Ok(PollOutcome::Interrupted);
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let status = match service.task_status(job, task).await? {
            Some(status) => status,
            None => {
                // Race between submission and status availability.
                warn!("no status yet for job id={}, task {task}", job.id);
                continue;
            }
        };

        match status {
            TaskStatus::Waiting | TaskStatus::Running | TaskStatus::Suspended => {
                debug!("job id={} status: {status:?}", job.id);
            }
            TaskStatus::Success => {
                debug!("job id={} status: success", job.id);
                // The sub-task is done; wait out any job-level finalization.
                service.wait_for_completion(job, interval).await?;
                return Ok(PollOutcome::Success);
            }
            TaskStatus::Failed => {
                let detail = match service.task_result(job, task).await {
                    Ok(detail) => detail,
                    Err(e) => format!("<failure detail unavailable: {e}>"),
                };
                error!("job id={} failed: {detail}", job.id);
                return Ok(PollOutcome::Failed(detail));
            }
            TaskStatus::Cancelled => {
                info!("job id={} cancelled", job.id);
                return Ok(PollOutcome::Cancelled);
            }
        }
    }
}
