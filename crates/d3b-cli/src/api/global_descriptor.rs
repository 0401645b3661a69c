use super::{Action, Dewrangle, StudyRef};
use crate::queries::UPSERT_GLOBAL_DESCRIPTORS;
use anyhow::Context;
use dewrangle::{
    DeleteSafety, Destination, Executor, FileTransfer, Id, Job, JsonMap, Mutation,
    MutationOutcome, TransferRequest, global_descriptors_path, hash_report_path,
    job_errors_path, study_file_path,
};
use serde_json::json;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Which descriptors to return for each global ID in a download
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, clap::ValueEnum)]
pub(crate) enum DescriptorSelection {
    #[default]
    All,
    MostRecent,
}

impl DescriptorSelection {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DescriptorSelection::All => "all",
            DescriptorSelection::MostRecent => "most-recent",
        }
    }
}

/// The result of submitting a global descriptor file
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct DescriptorUpsert {
    pub(crate) study_id: Id,
    pub(crate) study_global_id: String,
    pub(crate) study_file_id: String,
    pub(crate) outcome: MutationOutcome<Job>,
}

impl<E: Executor> Dewrangle<E> {
    /// Start the job that upserts the global descriptors in an uploaded study
    /// file
    pub(crate) fn trigger_global_descriptor_upsert(
        &self,
        study_file_id: &str,
        skip_unavailable_descriptors: bool,
    ) -> anyhow::Result<MutationOutcome<Job>> {
        tracing::info!("Upserting global descriptors for study file {study_file_id}");
        let vars = JsonMap::from_iter([(
            "input".to_owned(),
            json!({
                "studyFileId": study_file_id,
                "skipUnavailableDescriptors": skip_unavailable_descriptors,
            }),
        )]);
        let outcome: MutationOutcome<Job> = self.mutate(
            Action::Upsert,
            "global descriptors",
            Mutation::new(UPSERT_GLOBAL_DESCRIPTORS, "job", vars),
            DeleteSafety::Enforce,
        )?;
        if let MutationOutcome::Succeeded(ref job) = outcome {
            for e in &job.errors {
                tracing::error!(job = %job.id, name = ?e.name, "{}", e.message);
            }
        }
        Ok(outcome)
    }

    /// Upload a CSV of global descriptors to a study and start the upsert
    /// job for it
    pub(crate) fn upsert_global_descriptors<T: FileTransfer>(
        &self,
        transfer: &T,
        file: &Path,
        study: &StudyRef,
        skip_unavailable_descriptors: bool,
    ) -> anyhow::Result<DescriptorUpsert> {
        let study = self.resolve_study(study)?;
        let filename = file
            .file_name()
            .and_then(OsStr::to_str)
            .with_context(|| format!("{} does not name a file", file.display()))?;
        tracing::info!(
            "Upserting global IDs in {} to Dewrangle for study {}",
            file.display(),
            study.global_id
        );
        let request =
            TransferRequest::new(self.rest_url(&study_file_path(study.id.as_str(), filename)));
        let response = transfer
            .upload_file(&request, file)
            .with_context(|| format!("failed to upload {}", file.display()))?;
        let study_file_id = response
            .get("id")
            .and_then(serde_json::Value::as_str)
            .with_context(|| format!("study file upload response has no \"id\": {response}"))?
            .to_owned();
        let outcome =
            self.trigger_global_descriptor_upsert(&study_file_id, skip_unavailable_descriptors)?;
        if let MutationOutcome::Succeeded(ref job) = outcome {
            tracing::info!(job = %job.id, "Completed request to upsert global descriptors");
        }
        Ok(DescriptorUpsert {
            study_id: study.id,
            study_global_id: study.global_id,
            study_file_id,
            outcome,
        })
    }

    /// Download a study's global IDs, optionally only those touched by one
    /// upsert job
    pub(crate) fn download_global_descriptors<T: FileTransfer>(
        &self,
        transfer: &T,
        study: &StudyRef,
        job_id: Option<&Id>,
        descriptors: DescriptorSelection,
        dest: &Destination,
    ) -> anyhow::Result<PathBuf> {
        let study = self.resolve_study(study)?;
        let mut request =
            TransferRequest::new(self.rest_url(&global_descriptors_path(study.id.as_str())));
        if let Some(job_id) = job_id {
            request = request.param("job", job_id.as_str());
        }
        request = request.param("descriptors", descriptors.as_str());
        tracing::info!(
            "Downloading global IDs for study {} from {}",
            study.global_id,
            request.url
        );
        let path = transfer.download_file(&request, dest).with_context(|| {
            format!("failed to download global IDs for study {}", study.global_id)
        })?;
        tracing::info!(path = %path.display(), "Completed download of global IDs");
        Ok(path)
    }

    /// Upsert a file of global descriptors and download the global IDs the
    /// resulting job produced
    pub(crate) fn upsert_and_download_global_descriptors<T: FileTransfer>(
        &self,
        transfer: &T,
        file: &Path,
        study: &StudyRef,
        skip_unavailable_descriptors: bool,
        descriptors: DescriptorSelection,
        dest: &Destination,
    ) -> anyhow::Result<PathBuf> {
        let upsert =
            self.upsert_global_descriptors(transfer, file, study, skip_unavailable_descriptors)?;
        let job = match upsert.outcome {
            MutationOutcome::Succeeded(job) => job,
            MutationOutcome::Failed(errors) => {
                anyhow::bail!("global descriptor upsert was rejected:\n{errors}")
            }
        };
        self.download_global_descriptors(
            transfer,
            &StudyRef::Id(upsert.study_id),
            Some(&job.id),
            descriptors,
            dest,
        )
    }

    /// Download the error report of a job
    pub(crate) fn download_job_errors<T: FileTransfer>(
        &self,
        transfer: &T,
        job_id: &Id,
        dest: &Destination,
    ) -> anyhow::Result<PathBuf> {
        let request = TransferRequest::new(self.rest_url(&job_errors_path(job_id.as_str())));
        transfer
            .download_file(&request, dest)
            .with_context(|| format!("failed to download errors for job {job_id}"))
    }

    /// Download the file hash report produced by a volume list and hash job
    pub(crate) fn download_hash_report<T: FileTransfer>(
        &self,
        transfer: &T,
        job_id: &Id,
        dest: &Destination,
    ) -> anyhow::Result<PathBuf> {
        let request = TransferRequest::new(self.rest_url(&hash_report_path(job_id.as_str())));
        transfer
            .download_file(&request, dest)
            .with_context(|| format!("failed to download hash report for job {job_id}"))
    }
}
