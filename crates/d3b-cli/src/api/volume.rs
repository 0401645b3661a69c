use super::{Action, Dewrangle, StudyMap, StudyRef};
use crate::output::write_json;
use crate::queries::{
    CREATE_VOLUME, DELETE_VOLUME, GET_VOLUME, LIST_AND_HASH_VOLUME, NodeQuery, UPDATE_VOLUME,
    id_variables, input_variables, study_volumes,
};
use crate::types::{StartedJob, Study, Volume};
use anyhow::Context;
use dewrangle::{
    DeleteSafety, Executor, Id, JsonMap, Mutation, MutationOutcome, NestedMap, PollConfig,
    PollResult, VolumeKey, drain,
};
use serde_json::{Value, json};
use std::path::Path;

/// Volumes keyed by `bucket::prefix`, then by study node ID
pub(crate) type VolumeMap = NestedMap<VolumeKey, Id, Volume>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum VolumeRef {
    Id(Id),
    Location {
        bucket: String,
        path_prefix: Option<String>,
        study_global_id: String,
    },
}

impl VolumeRef {
    /// Build from a volume node ID, or else a bucket, prefix, and study
    pub(crate) fn from_options(
        volume_id: Option<String>,
        bucket: Option<String>,
        path_prefix: Option<String>,
        study_global_id: Option<String>,
    ) -> anyhow::Result<VolumeRef> {
        match (volume_id, bucket, study_global_id) {
            (Some(id), _, _) => Ok(VolumeRef::Id(Id::from(id))),
            (None, Some(bucket), Some(study_global_id)) => Ok(VolumeRef::Location {
                bucket,
                path_prefix,
                study_global_id,
            }),
            _ => anyhow::bail!(
                "either the volume's Dewrangle node ID or its bucket and study global ID are required to look up the volume"
            ),
        }
    }
}

impl Volume {
    fn key(&self) -> VolumeKey {
        VolumeKey::new(&self.name, self.path_prefix.as_deref())
    }
}

impl<E: Executor> Dewrangle<E> {
    fn drain_study_volumes<F>(&self, study: &Study, mut fold: F) -> anyhow::Result<()>
    where
        F: FnMut(Volume),
    {
        drain(
            self.executor(),
            &study_volumes(study.id.clone(), self.page_size),
            |page| {
                for mut volume in page {
                    volume.study_id = Some(study.id.clone());
                    volume.study_global_id = Some(study.global_id.clone());
                    fold(volume);
                }
            },
        )
        .with_context(|| format!("failed to fetch volumes for study {}", study.name))?;
        Ok(())
    }

    /// Fetch the volumes of every study in `studies` (all studies if not
    /// given), optionally restricted to the study with node ID `study_id`
    pub(crate) fn paginate_volumes(
        &self,
        studies: Option<&StudyMap>,
        study_id: Option<&Id>,
    ) -> anyhow::Result<VolumeMap> {
        let fetched;
        let studies = match studies {
            Some(studies) => studies,
            None => {
                fetched = self.paginate_studies(None)?;
                &fetched
            }
        };
        tracing::info!("Paginating Dewrangle volumes");
        let mut volumes = VolumeMap::new();
        for study in studies
            .values()
            .filter(|s| study_id.is_none_or(|id| &s.id == id))
        {
            self.drain_study_volumes(study, |volume| {
                volumes.insert(volume.key(), study.id.clone(), volume);
            })?;
        }
        Ok(volumes)
    }

    pub(crate) fn read_volumes(
        &self,
        study_global_id: Option<&str>,
        output_dir: Option<&Path>,
    ) -> anyhow::Result<VolumeMap> {
        let studies = self.paginate_studies(None)?;
        let study_id = match study_global_id {
            Some(global_id) => Some(
                studies
                    .get(global_id)
                    .with_context(|| format!("study with global ID {global_id} not found"))?
                    .id
                    .clone(),
            ),
            None => None,
        };
        let volumes = self.paginate_volumes(Some(&studies), study_id.as_ref())?;
        tracing::info!("Found {} volumes", volumes.len());
        if let Some(dir) = output_dir {
            write_json(dir, "Volume", &volumes)?;
        }
        Ok(volumes)
    }

    pub(crate) fn read_volume(&self, id: &Id) -> anyhow::Result<Volume> {
        let volume = self
            .query(&NodeQuery::<Volume>::new(GET_VOLUME, id.clone()))
            .with_context(|| format!("failed to fetch volume {id}"))?
            .with_context(|| format!("volume with ID {id} not found"))?;
        tracing::info!("Found Dewrangle volume {}", volume.key());
        Ok(volume)
    }

    /// Find the volume for `bucket` and `path_prefix` in `study`
    pub(crate) fn find_volume(
        &self,
        bucket: &str,
        path_prefix: Option<&str>,
        study: &Study,
    ) -> anyhow::Result<Option<Volume>> {
        let key = VolumeKey::new(bucket, path_prefix);
        let mut found = None;
        self.drain_study_volumes(study, |volume| {
            if volume.key() == key {
                found = Some(volume);
            }
        })?;
        Ok(found)
    }

    fn resolve_volume_id(&self, volume: &VolumeRef) -> anyhow::Result<Id> {
        match volume {
            VolumeRef::Id(id) => Ok(id.clone()),
            VolumeRef::Location {
                bucket,
                path_prefix,
                study_global_id,
            } => {
                let study = self.resolve_study(&StudyRef::GlobalId(study_global_id.clone()))?;
                let Some(found) = self.find_volume(bucket, path_prefix.as_deref(), &study)? else {
                    tracing::warn!(
                        "Could not find Dewrangle ID for volume {} in study {study_global_id}",
                        VolumeKey::new(bucket, path_prefix.as_deref())
                    );
                    anyhow::bail!("volume {bucket} not found in study {study_global_id}");
                };
                Ok(found.id)
            }
        }
    }

    /// Create a volume in a study, or point the study's existing volume for
    /// the same bucket and prefix at a (possibly new) credential.  When
    /// `input` has no `credentialId`, the credential is looked up in the
    /// study by `credential_key`.
    pub(crate) fn upsert_volume(
        &self,
        mut input: JsonMap,
        study: &StudyRef,
        credential_key: Option<&str>,
    ) -> anyhow::Result<MutationOutcome<Volume>> {
        let study = self.resolve_study(study)?;
        let credential_id = match input.get("credentialId").and_then(Value::as_str) {
            Some(id) => Id::from(id),
            None => {
                let key = credential_key
                    .context("a credential key is required when no credentialId is given")?;
                let cred = self.find_credential(key, &study)?.with_context(|| {
                    format!("credential {key} not found in study {}", study.global_id)
                })?;
                input.insert("credentialId".to_owned(), cred.id.clone().into());
                cred.id
            }
        };
        let existing = match input.get("name").and_then(Value::as_str) {
            Some(bucket) => {
                let prefix = input.get("pathPrefix").and_then(Value::as_str);
                self.find_volume(bucket, prefix, &study)?
            }
            None => None,
        };
        let outcome = if let Some(volume) = existing {
            let update = JsonMap::from_iter([("credentialId".to_owned(), credential_id.into())]);
            self.mutate(
                Action::Update,
                "volume",
                Mutation::new(UPDATE_VOLUME, "volume", input_variables(Some(&volume.id), update)),
                DeleteSafety::Enforce,
            )?
        } else {
            input.insert("studyId".to_owned(), study.id.clone().into());
            self.mutate(
                Action::Create,
                "volume",
                Mutation::new(CREATE_VOLUME, "volume", input_variables(None, input)),
                DeleteSafety::Enforce,
            )?
        };
        Ok(outcome.map(|mut volume: Volume| {
            volume.study_id = Some(study.id.clone());
            volume.study_global_id = Some(study.global_id.clone());
            volume
        }))
    }

    pub(crate) fn delete_volume(
        &self,
        volume: &VolumeRef,
        safety: DeleteSafety,
    ) -> anyhow::Result<MutationOutcome<Volume>> {
        let node_id = self.resolve_volume_id(volume)?;
        self.mutate(
            Action::Delete,
            "volume",
            Mutation::new(DELETE_VOLUME, "volume", id_variables(&node_id)).destructive(),
            safety,
        )
    }

    /// Start a job listing and hashing the files in a volume, billed to
    /// `billing_group_id`
    pub(crate) fn list_and_hash_volume(
        &self,
        billing_group_id: &str,
        volume: &VolumeRef,
    ) -> anyhow::Result<MutationOutcome<StartedJob>> {
        if billing_group_id.trim().is_empty() {
            anyhow::bail!("billing group ID is missing and required to hash a volume");
        }
        let volume_id = self.resolve_volume_id(volume)?;
        let input = JsonMap::from_iter([("billingGroupId".to_owned(), json!(billing_group_id))]);
        self.mutate(
            Action::ListAndHash,
            "volume",
            Mutation::new(LIST_AND_HASH_VOLUME, "job", input_variables(Some(&volume_id), input)),
            DeleteSafety::Enforce,
        )
    }

    /// List and hash a volume, then poll the job until it finishes
    pub(crate) fn hash_volume_and_wait(
        &self,
        billing_group_id: &str,
        volume: &VolumeRef,
        config: &PollConfig,
    ) -> anyhow::Result<PollResult> {
        let job = match self.list_and_hash_volume(billing_group_id, volume)? {
            MutationOutcome::Succeeded(job) => job,
            MutationOutcome::Failed(errors) => {
                anyhow::bail!("volume list and hash was rejected:\n{errors}")
            }
        };
        tracing::info!(job = %job.id, "Started volume list and hash job");
        self.poll_job(&job.id, config)
    }
}
