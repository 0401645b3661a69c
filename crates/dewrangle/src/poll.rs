use crate::job::{Job, JobQuery};
use crate::queries::Query;
use crate::types::{Id, JsonMap};
use crate::{Executor, QueryError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollConfig {
    /// Give up once this much time has passed since the first fetch.  `None`
    /// polls until the job finishes.
    pub timeout: Option<Duration>,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> PollConfig {
        PollConfig {
            timeout: None,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What a completion check reports about one observation of a job
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub struct CompletionStatus {
    pub complete: bool,
    pub success: bool,
}

impl CompletionStatus {
    /// Validate the raw value returned by a completion check.  Both `complete`
    /// and `success` must be present as booleans.
    pub fn from_value(value: Value) -> Result<CompletionStatus, PollError> {
        serde_json::from_value(value.clone())
            .map_err(|source| PollError::MalformedStatus { value, source })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    /// Polling was abandoned; the job may still be running remotely
    TimedOut,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollResult {
    pub outcome: JobOutcome,
    /// The job as last observed
    pub job: Job,
}

impl PollResult {
    /// `Some(true)` on success, `Some(false)` on failure, `None` on timeout
    pub fn success(&self) -> Option<bool> {
        match self.outcome {
            JobOutcome::Succeeded => Some(true),
            JobOutcome::Failed => Some(false),
            JobOutcome::TimedOut => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to fetch job")]
    Query(#[from] QueryError),
    #[error(
        "invalid job completion check result {value}; expected {{\"complete\": <bool>, \"success\": <bool>}}"
    )]
    MalformedStatus {
        value: Value,
        #[source]
        source: serde_json::Error,
    },
    #[error("job {0} not found")]
    NotFound(Id),
    #[error("failed to deserialize job {id}")]
    Job {
        id: Id,
        #[source]
        source: serde_json::Error,
    },
}

/// Observe job `job_id` until it finishes, fails, or `config.timeout`
/// elapses.
///
/// `fetch` returns the raw response for the job (with the job under
/// `"node"`), and `check` maps that response to a value of the form
/// `{"complete": bool, "success": bool}`.  Polling stops as soon as the job
/// is complete or reports failure, even if it has not completed.  A timeout
/// is not an error; it yields [`JobOutcome::TimedOut`].
pub fn poll<F, C>(
    job_id: &Id,
    mut fetch: F,
    check: C,
    config: &PollConfig,
) -> Result<PollResult, PollError>
where
    F: FnMut(&Id) -> Result<JsonMap, QueryError>,
    C: Fn(&JsonMap) -> Value,
{
    let start = Instant::now();
    loop {
        let response = fetch(job_id)?;
        let status = CompletionStatus::from_value(check(&response))?;
        let job = job_from_response(job_id, response)?;
        let operation = job.operation.kebab_name();
        if status.complete || !status.success {
            if status.success {
                tracing::info!(job = %job.id, "Job {operation} completed");
            } else {
                tracing::error!(
                    job = %job.id,
                    errors = job.errors.0.len(),
                    "Job {operation} completed with errors"
                );
                for e in &job.errors {
                    tracing::error!(job = %job.id, name = ?e.name, "{}", e.message);
                }
            }
            let outcome = if status.success {
                JobOutcome::Succeeded
            } else {
                JobOutcome::Failed
            };
            return Ok(PollResult { outcome, job });
        }
        let elapsed = start.elapsed();
        if let Some(timeout) = config.timeout
            && elapsed > timeout
        {
            tracing::warn!(
                job = %job.id,
                "Timeout of {} expired while job {operation} is still running; Dewrangle may still be working, but polling has stopped",
                humantime::format_duration(timeout)
            );
            return Ok(PollResult {
                outcome: JobOutcome::TimedOut,
                job,
            });
        }
        tracing::info!(
            job = %job.id,
            "Waiting for job {operation} to complete. Elapsed time: {}",
            humantime::format_duration(Duration::from_secs(elapsed.as_secs()))
        );
        thread::sleep(config.interval);
    }
}

fn job_from_response(job_id: &Id, mut response: JsonMap) -> Result<Job, PollError> {
    match response.remove("node") {
        None | Some(Value::Null) => Err(PollError::NotFound(job_id.clone())),
        Some(node) => serde_json::from_value(node).map_err(|source| PollError::Job {
            id: job_id.clone(),
            source,
        }),
    }
}

/// The standard completion check: a job is complete once `completedAt` is
/// set, and successful while it has no errors attached.
pub fn job_completion_status(response: &JsonMap) -> Value {
    let node = response.get("node");
    let complete = node
        .and_then(|n| n.get("completedAt"))
        .is_some_and(|v| !v.is_null());
    let success = node
        .and_then(|n| n.get("errors"))
        .and_then(|e| e.get("edges"))
        .and_then(Value::as_array)
        .is_none_or(Vec::is_empty);
    json!({"complete": complete, "success": success})
}

/// Poll a Dewrangle job with the standard completion check
pub fn poll_job<E: Executor>(
    executor: &E,
    job_id: &Id,
    config: &PollConfig,
) -> Result<PollResult, PollError> {
    poll(
        job_id,
        |id| executor.send(JobQuery::new(id.clone()).payload()),
        job_completion_status,
        config,
    )
}
