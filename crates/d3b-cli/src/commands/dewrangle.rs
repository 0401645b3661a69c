use super::print_json;
use crate::api::{
    CredentialRef, DescriptorSelection, Dewrangle, OrganizationRef, StudyRef, VolumeRef,
};
use crate::output::{DEFAULT_OUTPUT_DIR, InputFields, read_json_input};
use clap::{Args, Subcommand};
use dewrangle::{
    Client, ClientConfig, DEFAULT_EXECUTION_TIMEOUT, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL,
    DeleteSafety, Destination, Id, JobOutcome, MutationOutcome, PollConfig, PollResult,
};
use patharg::InputArg;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;

static DEFAULT_CREDENTIAL_TYPE: &str = "AWS";

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(super) struct DewrangleArgs {
    /// Base URL of the Dewrangle instance
    #[arg(long, env = "DEWRANGLE_BASE_URL")]
    base_url: Option<String>,

    /// Dewrangle personal access token
    #[arg(long, env = "DEWRANGLE_DEV_PAT", hide_env_values = true)]
    token: Option<String>,

    /// Number of items to request per page of results
    #[arg(short = 'P', long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: NonZeroUsize,

    /// Time limit for each GraphQL request
    #[arg(long, default_value_t = DEFAULT_EXECUTION_TIMEOUT.into(), value_name = "DURATION")]
    execution_timeout: humantime::Duration,

    #[command(subcommand)]
    command: DewrangleCommand,
}

/// Options for naming a study by node ID or global ID
#[derive(Args, Clone, Debug, Eq, PartialEq)]
struct StudyOpts {
    /// GraphQL node ID of the study
    #[arg(long, conflicts_with = "study_global_id")]
    study_id: Option<String>,

    /// Global ID of the study
    #[arg(long)]
    study_global_id: Option<String>,
}

impl StudyOpts {
    fn study_ref(self) -> anyhow::Result<StudyRef> {
        StudyRef::from_options(self.study_id, self.study_global_id)
    }
}

/// Options for naming a volume by node ID, or by bucket, path prefix, and
/// study
#[derive(Args, Clone, Debug, Eq, PartialEq)]
struct VolumeOpts {
    /// GraphQL node ID of the volume
    #[arg(long, alias = "node-id")]
    volume_id: Option<String>,

    /// S3 bucket the volume points to
    #[arg(long)]
    bucket: Option<String>,

    /// Path within the bucket the volume points to
    #[arg(long)]
    path_prefix: Option<String>,

    /// Global ID of the study the volume belongs to
    #[arg(long)]
    study_global_id: Option<String>,
}

impl VolumeOpts {
    fn volume_ref(self) -> anyhow::Result<VolumeRef> {
        VolumeRef::from_options(
            self.volume_id,
            self.bucket,
            self.path_prefix,
            self.study_global_id,
        )
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
struct OutputDir {
    /// Directory in which to write the fetched entities as JSON
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
}

/// Where to save a downloaded file
#[derive(Args, Clone, Debug, Eq, PartialEq)]
struct DownloadOpts {
    /// Directory in which to save the file under the name chosen by Dewrangle
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Save the file to exactly this path instead
    #[arg(long)]
    output_file: Option<PathBuf>,
}

impl DownloadOpts {
    fn destination(self) -> Destination {
        match self.output_file {
            Some(path) => Destination::File(path),
            None => Destination::Directory(self.output_dir),
        }
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
struct PollOpts {
    /// Stop polling after this long; the job keeps running in Dewrangle
    #[arg(long, value_name = "DURATION")]
    timeout: Option<humantime::Duration>,

    /// Time to wait between checks of the job's status
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.into(), value_name = "DURATION")]
    interval: humantime::Duration,
}

impl PollOpts {
    fn config(&self) -> PollConfig {
        PollConfig {
            timeout: self.timeout.map(Into::into),
            interval: self.interval.into(),
        }
    }
}

#[derive(Args, Clone, Copy, Debug, Eq, PartialEq)]
struct DeleteOpts {
    /// Allow deletes against hosts other than localhost
    #[arg(long)]
    disable_delete_safety_check: bool,
}

impl DeleteOpts {
    fn safety(self) -> DeleteSafety {
        DeleteSafety::from_disable_flag(self.disable_delete_safety_check)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
enum DewrangleCommand {
    /// Fetch all organizations the user belongs to
    ReadOrganizations(OutputDir),

    /// Create an organization, or update the one with the same name
    UpsertOrganization {
        /// JSON file of organization fields
        filepath: InputArg,
    },

    /// Delete an organization by node ID or name
    DeleteOrganization {
        #[arg(long, required_unless_present = "org_name", conflicts_with = "org_name")]
        org_id: Option<String>,

        #[arg(long)]
        org_name: Option<String>,

        #[command(flatten)]
        delete: DeleteOpts,
    },

    /// Fetch all studies in all of the user's organizations
    ReadStudies(OutputDir),

    /// Fetch one study by node ID
    GetStudy { node_id: String },

    /// Look up a study by Kids First ID or global ID within one organization
    FindOrganizationStudy {
        study_id: String,

        /// Node ID of the organization to search
        organization_id: String,
    },

    /// Create or update a study in an organization
    UpsertStudy {
        /// Kids First ID or global ID of an existing study to update
        #[arg(long)]
        study_id: Option<String>,

        /// JSON file of study fields
        filepath: InputArg,

        /// Node ID of the organization the study belongs to
        organization_id: String,
    },

    /// Delete a study by Kids First ID or node ID
    DeleteStudy {
        study_id: String,

        #[command(flatten)]
        delete: DeleteOpts,
    },

    /// Fetch all credentials, optionally of only one study
    ReadCredentials {
        #[command(flatten)]
        output: OutputDir,

        #[arg(long)]
        study_global_id: Option<String>,
    },

    /// Fetch one credential by node ID
    GetCredential { node_id: String },

    /// Create a credential in a study, or update the one with the same key.
    /// Options override fields read from `--filepath`.
    UpsertCredential {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        key: Option<String>,

        #[arg(long)]
        secret: Option<String>,

        #[arg(long, default_value = DEFAULT_CREDENTIAL_TYPE)]
        credential_type: String,

        #[command(flatten)]
        study: StudyOpts,

        /// JSON file of credential fields
        #[arg(long)]
        filepath: Option<InputArg>,
    },

    /// Delete a credential by node ID, or by key and study
    DeleteCredential {
        #[arg(long, required_unless_present_all = ["credential_key", "study_global_id"])]
        node_id: Option<String>,

        #[arg(long, requires = "study_global_id")]
        credential_key: Option<String>,

        #[arg(long)]
        study_global_id: Option<String>,

        #[command(flatten)]
        delete: DeleteOpts,
    },

    /// Fetch all volumes, optionally of only one study
    ReadVolumes {
        #[command(flatten)]
        output: OutputDir,

        #[arg(long)]
        study_global_id: Option<String>,
    },

    /// Fetch one volume by node ID
    GetVolume { node_id: String },

    /// Create a volume in a study, or point the study's volume for the same
    /// bucket and prefix at a credential.  Options override fields read from
    /// `--filepath`.
    UpsertVolume {
        /// S3 bucket the volume points to
        #[arg(long)]
        bucket: Option<String>,

        #[arg(long)]
        path_prefix: Option<String>,

        /// AWS region of the bucket
        #[arg(long, env = "AWS_DEFAULT_REGION", default_value = "us-east-1")]
        region: String,

        /// Key of the study credential that grants access to the bucket
        #[arg(long)]
        credential_key: Option<String>,

        #[command(flatten)]
        study: StudyOpts,

        /// JSON file of volume fields
        #[arg(long)]
        filepath: Option<InputArg>,
    },

    /// Delete a volume by node ID, or by bucket, prefix, and study
    DeleteVolume {
        #[command(flatten)]
        volume: VolumeOpts,

        #[command(flatten)]
        delete: DeleteOpts,
    },

    /// Start a job that lists and hashes the files in a volume
    ListAndHashVolume {
        #[arg(long, env = "CAVATICA_BILLING_GROUP_ID")]
        billing_group_id: String,

        #[command(flatten)]
        volume: VolumeOpts,
    },

    /// List and hash a volume, then wait for the job to finish
    ///
    /// The job's status is checked every 30 seconds.
    HashVolumeAndWait {
        #[arg(long, env = "CAVATICA_BILLING_GROUP_ID")]
        billing_group_id: String,

        #[command(flatten)]
        volume: VolumeOpts,

        /// Stop polling after this long; the job keeps running in Dewrangle
        #[arg(long, value_name = "DURATION")]
        timeout: Option<humantime::Duration>,
    },

    /// Fetch all billing groups in all of the user's organizations
    ReadBillingGroups(OutputDir),

    /// Fetch one billing group by node ID
    GetBillingGroup { node_id: String },

    /// Add a Cavatica billing group to an organization
    CreateBillingGroup {
        #[arg(long, env = "CAVATICA_BILLING_GROUP_ID")]
        cavatica_billing_group_id: String,

        /// Node ID of the organization
        #[arg(long)]
        organization_id: String,

        /// Use the existing billing group if creation is rejected
        #[arg(long)]
        or_find: bool,
    },

    /// Delete a billing group by node ID
    DeleteBillingGroup {
        node_id: String,

        #[command(flatten)]
        delete: DeleteOpts,
    },

    /// Fetch a job and report its errors
    ReadJob {
        node_id: String,

        #[command(flatten)]
        output: OutputDir,
    },

    /// Wait for a job to finish
    PollJob {
        node_id: String,

        #[command(flatten)]
        poll: PollOpts,
    },

    /// Upload a CSV of global descriptors to a study and upsert them.
    ///
    /// Rows with only `fhirResourceType` and `descriptor` mint new global
    /// IDs; rows that also have `globalId` update existing ones.
    UpsertGlobalDescriptors {
        #[command(flatten)]
        study: StudyOpts,

        /// Ignore descriptors that Dewrangle cannot find
        #[arg(long)]
        skip_unavailable_descriptors: bool,

        /// Download the global IDs produced by the upsert afterwards
        #[arg(long)]
        download: bool,

        /// Which descriptors to download for each global ID
        #[arg(long, value_enum, default_value_t, requires = "download")]
        descriptors: DescriptorSelection,

        #[command(flatten)]
        dest: DownloadOpts,

        /// CSV of global descriptors
        filepath: PathBuf,
    },

    /// Download a study's global IDs and their descriptors
    DownloadGlobalDescriptors {
        #[command(flatten)]
        study: StudyOpts,

        /// Only include the global IDs touched by this upsert job
        #[arg(long)]
        job_id: Option<String>,

        /// Which descriptors to include for each global ID
        #[arg(long, value_enum, default_value_t)]
        descriptors: DescriptorSelection,

        #[command(flatten)]
        dest: DownloadOpts,
    },

    /// Download the error report of a job
    DownloadJobErrors {
        job_id: String,

        #[command(flatten)]
        dest: DownloadOpts,
    },

    /// Download the file hash report of a volume list and hash job
    DownloadHashReport {
        job_id: String,

        #[command(flatten)]
        dest: DownloadOpts,
    },
}

impl DewrangleArgs {
    pub(super) fn run(self) -> anyhow::Result<()> {
        let config = ClientConfig::new(self.base_url.as_deref(), self.token.as_deref())?
            .execution_timeout(self.execution_timeout.into());
        let client = Client::new(config)?;
        let api = Dewrangle::new(client).with_page_size(self.page_size);
        self.command.run(&api)
    }
}

impl DewrangleCommand {
    fn run(self, api: &Dewrangle<Client>) -> anyhow::Result<()> {
        match self {
            DewrangleCommand::ReadOrganizations(o) => {
                api.read_organizations(Some(&o.output_dir))?;
            }
            DewrangleCommand::UpsertOrganization { filepath } => {
                let input = read_json_input(&filepath)?;
                report_outcome(api.upsert_organization(input)?)?;
            }
            DewrangleCommand::DeleteOrganization {
                org_id,
                org_name,
                delete,
            } => {
                let org = match (org_id, org_name) {
                    (Some(id), _) => OrganizationRef::Id(Id::from(id)),
                    (None, Some(name)) => OrganizationRef::Name(name),
                    (None, None) => anyhow::bail!("an organization ID or name is required"),
                };
                report_outcome(api.delete_organization(&org, delete.safety())?)?;
            }
            DewrangleCommand::ReadStudies(o) => {
                api.read_studies(Some(&o.output_dir))?;
            }
            DewrangleCommand::GetStudy { node_id } => {
                print_json(&api.read_study(&Id::from(node_id))?)?;
            }
            DewrangleCommand::FindOrganizationStudy {
                study_id,
                organization_id,
            } => {
                let org_id = Id::from(organization_id);
                let Some(study) = api.get_organization_study(&study_id, &org_id)? else {
                    anyhow::bail!("study {study_id} not found in organization {org_id}");
                };
                print_json(&study)?;
            }
            DewrangleCommand::UpsertStudy {
                study_id,
                filepath,
                organization_id,
            } => {
                let input = read_json_input(&filepath)?;
                report_outcome(api.upsert_study(
                    input,
                    &Id::from(organization_id),
                    study_id.as_deref(),
                )?)?;
            }
            DewrangleCommand::DeleteStudy { study_id, delete } => {
                report_outcome(api.delete_study(&study_id, delete.safety())?)?;
            }
            DewrangleCommand::ReadCredentials {
                output,
                study_global_id,
            } => {
                api.read_credentials(study_global_id.as_deref(), Some(&output.output_dir))?;
            }
            DewrangleCommand::GetCredential { node_id } => {
                print_json(&api.read_credential(&Id::from(node_id))?)?;
            }
            DewrangleCommand::UpsertCredential {
                name,
                key,
                secret,
                credential_type,
                study,
                filepath,
            } => {
                let input = InputFields::load(filepath.as_ref())?
                    .set("name", name)
                    .set("key", key)
                    .set("secret", secret)
                    .set("type", Some(credential_type))
                    .into_inner();
                report_outcome(api.upsert_credential(input, &study.study_ref()?)?)?;
            }
            DewrangleCommand::DeleteCredential {
                node_id,
                credential_key,
                study_global_id,
                delete,
            } => {
                let cred = match (node_id, credential_key, study_global_id) {
                    (Some(id), _, _) => CredentialRef::Id(Id::from(id)),
                    (None, Some(key), Some(study_global_id)) => CredentialRef::Key {
                        key,
                        study_global_id,
                    },
                    _ => anyhow::bail!(
                        "either the credential's node ID or its key and study global ID are required"
                    ),
                };
                report_outcome(api.delete_credential(&cred, delete.safety())?)?;
            }
            DewrangleCommand::ReadVolumes {
                output,
                study_global_id,
            } => {
                api.read_volumes(study_global_id.as_deref(), Some(&output.output_dir))?;
            }
            DewrangleCommand::GetVolume { node_id } => {
                print_json(&api.read_volume(&Id::from(node_id))?)?;
            }
            DewrangleCommand::UpsertVolume {
                bucket,
                path_prefix,
                region,
                credential_key,
                study,
                filepath,
            } => {
                let input = InputFields::load(filepath.as_ref())?
                    .set("name", bucket)
                    .set("pathPrefix", path_prefix)
                    .set("region", Some(region))
                    .into_inner();
                report_outcome(api.upsert_volume(
                    input,
                    &study.study_ref()?,
                    credential_key.as_deref(),
                )?)?;
            }
            DewrangleCommand::DeleteVolume { volume, delete } => {
                report_outcome(api.delete_volume(&volume.volume_ref()?, delete.safety())?)?;
            }
            DewrangleCommand::ListAndHashVolume {
                billing_group_id,
                volume,
            } => {
                report_outcome(
                    api.list_and_hash_volume(&billing_group_id, &volume.volume_ref()?)?,
                )?;
            }
            DewrangleCommand::HashVolumeAndWait {
                billing_group_id,
                volume,
                timeout,
            } => {
                let config = PollConfig {
                    timeout: timeout.map(Into::into),
                    interval: DEFAULT_POLL_INTERVAL,
                };
                let result =
                    api.hash_volume_and_wait(&billing_group_id, &volume.volume_ref()?, &config)?;
                report_poll(&result)?;
            }
            DewrangleCommand::ReadBillingGroups(o) => {
                api.read_billing_groups(Some(&o.output_dir))?;
            }
            DewrangleCommand::GetBillingGroup { node_id } => {
                print_json(&api.read_billing_group(&Id::from(node_id))?)?;
            }
            DewrangleCommand::CreateBillingGroup {
                cavatica_billing_group_id,
                organization_id,
                or_find,
            } => {
                let org_id = Id::from(organization_id);
                if or_find {
                    print_json(
                        &api.create_or_find_billing_group(&org_id, &cavatica_billing_group_id)?,
                    )?;
                } else {
                    report_outcome(
                        api.create_billing_group(&org_id, &cavatica_billing_group_id)?,
                    )?;
                }
            }
            DewrangleCommand::DeleteBillingGroup { node_id, delete } => {
                report_outcome(api.delete_billing_group(&Id::from(node_id), delete.safety())?)?;
            }
            DewrangleCommand::ReadJob { node_id, output } => {
                api.read_job(&Id::from(node_id), Some(&output.output_dir))?;
            }
            DewrangleCommand::PollJob { node_id, poll } => {
                let result = api.poll_job(&Id::from(node_id), &poll.config())?;
                report_poll(&result)?;
            }
            DewrangleCommand::UpsertGlobalDescriptors {
                study,
                skip_unavailable_descriptors,
                download,
                descriptors,
                dest,
                filepath,
            } => {
                let study = study.study_ref()?;
                let transfer = api.executor();
                if download {
                    let path = api.upsert_and_download_global_descriptors(
                        transfer,
                        &filepath,
                        &study,
                        skip_unavailable_descriptors,
                        descriptors,
                        &dest.destination(),
                    )?;
                    println!("{}", path.display());
                } else {
                    let upsert = api.upsert_global_descriptors(
                        transfer,
                        &filepath,
                        &study,
                        skip_unavailable_descriptors,
                    )?;
                    tracing::info!(
                        study = %upsert.study_id,
                        study_file = %upsert.study_file_id,
                        "Submitted global descriptors for study {}",
                        upsert.study_global_id
                    );
                    report_outcome(upsert.outcome)?;
                }
            }
            DewrangleCommand::DownloadGlobalDescriptors {
                study,
                job_id,
                descriptors,
                dest,
            } => {
                let job_id = job_id.map(Id::from);
                let path = api.download_global_descriptors(
                    api.executor(),
                    &study.study_ref()?,
                    job_id.as_ref(),
                    descriptors,
                    &dest.destination(),
                )?;
                println!("{}", path.display());
            }
            DewrangleCommand::DownloadJobErrors { job_id, dest } => {
                let path = api.download_job_errors(
                    api.executor(),
                    &Id::from(job_id),
                    &dest.destination(),
                )?;
                println!("{}", path.display());
            }
            DewrangleCommand::DownloadHashReport { job_id, dest } => {
                let path = api.download_hash_report(
                    api.executor(),
                    &Id::from(job_id),
                    &dest.destination(),
                )?;
                println!("{}", path.display());
            }
        }
        Ok(())
    }
}

/// Print the entity returned by an accepted mutation.  A rejected mutation
/// has already been logged and becomes a failing exit status.
fn report_outcome<T: Serialize>(outcome: MutationOutcome<T>) -> anyhow::Result<()> {
    match outcome {
        MutationOutcome::Succeeded(value) => print_json(&value),
        MutationOutcome::Failed(_) => anyhow::bail!("Dewrangle rejected the request"),
    }
}

/// Print the last observed state of a polled job.  Every terminal poll
/// state, including a failed job or a timeout, exits successfully.
fn report_poll(result: &PollResult) -> anyhow::Result<()> {
    print_json(&result.job)?;
    if result.outcome == JobOutcome::Failed {
        tracing::error!(
            job = %result.job.id,
            "Job failed; run `read-job` or `download-job-errors` for details"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Arguments, Command};
    use clap::Parser;
    use clap::error::ErrorKind;
    use dewrangle::{EdgeList, Job, JobError, JobOperation};

    fn failed_job() -> Job {
        Job {
            id: Id::from("job-1"),
            operation: JobOperation::VolumeListAndHash,
            completed_at: Some("2024-05-01T00:00:00Z".into()),
            errors: EdgeList(vec![JobError {
                id: Some(Id::from("err-1")),
                name: Some("HashError".into()),
                message: "could not read object".into(),
            }]),
        }
    }

    #[test]
    fn failed_job_is_not_an_error() {
        let result = PollResult {
            outcome: JobOutcome::Failed,
            job: failed_job(),
        };
        assert!(report_poll(&result).is_ok());
    }

    #[test]
    fn timed_out_job_is_not_an_error() {
        let mut job = failed_job();
        job.completed_at = None;
        job.errors = EdgeList(Vec::new());
        let result = PollResult {
            outcome: JobOutcome::TimedOut,
            job,
        };
        assert!(report_poll(&result).is_ok());
    }

    #[test]
    fn hash_and_wait_has_fixed_interval() {
        let args = Arguments::try_parse_from([
            "d3b",
            "dewrangle",
            "hash-volume-and-wait",
            "--billing-group-id",
            "bg-1",
            "--volume-id",
            "vol-1",
            "--timeout",
            "5m",
        ])
        .unwrap();
        let Command::Dewrangle(DewrangleArgs {
            command: DewrangleCommand::HashVolumeAndWait { timeout, .. },
            ..
        }) = args.command
        else {
            panic!("parsed the wrong command");
        };
        assert_eq!(timeout, Some("5m".parse::<humantime::Duration>().unwrap()));
        let err = Arguments::try_parse_from([
            "d3b",
            "dewrangle",
            "hash-volume-and-wait",
            "--billing-group-id",
            "bg-1",
            "--volume-id",
            "vol-1",
            "--interval",
            "5s",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
