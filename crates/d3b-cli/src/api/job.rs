use super::Dewrangle;
use crate::output::write_json;
use anyhow::Context;
use dewrangle::{Executor, Id, Job, JobQuery, PollConfig, PollResult, poll_job};
use std::path::Path;

impl<E: Executor> Dewrangle<E> {
    /// Fetch a job and report its errors, writing it to
    /// `<output_dir>/Job-<operation>.json` if an output directory is given
    pub(crate) fn read_job(&self, id: &Id, output_dir: Option<&Path>) -> anyhow::Result<Job> {
        let job = self
            .query(&JobQuery::new(id.clone()))
            .with_context(|| format!("failed to fetch job {id}"))?
            .with_context(|| format!("job with ID {id} not found"))?;
        let operation = job.operation.kebab_name();
        tracing::info!(job = %job.id, "Fetched job {operation}");
        if job.errors.is_empty() {
            tracing::info!(job = %job.id, "Job {operation} has no errors");
        } else {
            for e in &job.errors {
                tracing::error!(job = %job.id, name = ?e.name, "{}", e.message);
            }
        }
        if let Some(dir) = output_dir {
            write_json(dir, &format!("Job-{operation}"), &job)?;
            tracing::info!(
                "Found {} errors for job {operation}",
                job.errors.0.len()
            );
        }
        Ok(job)
    }

    pub(crate) fn poll_job(&self, id: &Id, config: &PollConfig) -> anyhow::Result<PollResult> {
        poll_job(self.executor(), id, config).with_context(|| format!("failed to poll job {id}"))
    }
}
