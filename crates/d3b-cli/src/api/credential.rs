use super::{Action, Dewrangle, StudyMap, StudyRef};
use crate::output::write_json;
use crate::queries::{
    CREATE_CREDENTIAL, DELETE_CREDENTIAL, GET_CREDENTIAL, NodeQuery, UPDATE_CREDENTIAL,
    id_variables, input_variables, study_credentials,
};
use crate::types::{Credential, Study};
use anyhow::Context;
use dewrangle::{
    DeleteSafety, Executor, Id, JsonMap, Mutation, MutationOutcome, NestedMap, drain,
};
use std::path::Path;

/// Credentials keyed by credential key, then by study node ID
pub(crate) type CredentialMap = NestedMap<String, Id, Credential>;

/// Fields of a credential that cannot be changed once it exists
static IMMUTABLE_CREDENTIAL_FIELDS: [&str; 4] = ["key", "secret", "type", "studyId"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum CredentialRef {
    Id(Id),
    Key { key: String, study_global_id: String },
}

impl<E: Executor> Dewrangle<E> {
    fn drain_study_credentials<F>(&self, study: &Study, mut fold: F) -> anyhow::Result<()>
    where
        F: FnMut(Credential),
    {
        drain(
            self.executor(),
            &study_credentials(study.id.clone(), self.page_size),
            |page| {
                for mut cred in page {
                    cred.study_id = Some(study.id.clone());
                    cred.study_global_id = Some(study.global_id.clone());
                    fold(cred);
                }
            },
        )
        .with_context(|| format!("failed to fetch credentials for study {}", study.global_id))?;
        Ok(())
    }

    /// Fetch the credentials of every study in `studies` (all studies if not
    /// given), optionally restricted to the study with node ID `study_id`
    pub(crate) fn paginate_credentials(
        &self,
        studies: Option<&StudyMap>,
        study_id: Option<&Id>,
    ) -> anyhow::Result<CredentialMap> {
        let fetched;
        let studies = match studies {
            Some(studies) => studies,
            None => {
                fetched = self.paginate_studies(None)?;
                &fetched
            }
        };
        tracing::info!("Paginating Dewrangle credentials");
        let mut creds = CredentialMap::new();
        for study in studies
            .values()
            .filter(|s| study_id.is_none_or(|id| &s.id == id))
        {
            self.drain_study_credentials(study, |cred| {
                creds.insert(cred.key.clone(), study.id.clone(), cred);
            })?;
        }
        Ok(creds)
    }

    pub(crate) fn read_credentials(
        &self,
        study_global_id: Option<&str>,
        output_dir: Option<&Path>,
    ) -> anyhow::Result<CredentialMap> {
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
        let creds = self.paginate_credentials(Some(&studies), study_id.as_ref())?;
        tracing::info!("Found {} credentials", creds.len());
        if let Some(dir) = output_dir {
            write_json(dir, "Credential", &creds)?;
        }
        Ok(creds)
    }

    pub(crate) fn read_credential(&self, id: &Id) -> anyhow::Result<Credential> {
        let cred = self
            .query(&NodeQuery::<Credential>::new(GET_CREDENTIAL, id.clone()))
            .with_context(|| format!("failed to fetch credential {id}"))?
            .with_context(|| format!("credential with ID {id} not found"))?;
        tracing::info!("Found Dewrangle credential {}", cred.key);
        Ok(cred)
    }

    /// Find the credential with key `key` in `study`
    pub(crate) fn find_credential(
        &self,
        key: &str,
        study: &Study,
    ) -> anyhow::Result<Option<Credential>> {
        let mut found = None;
        self.drain_study_credentials(study, |cred| {
            if cred.key == key {
                found = Some(cred);
            }
        })?;
        Ok(found)
    }

    /// Create a credential in a study, or update the study's credential
    /// with the same key.  Updates send only the mutable fields.
    pub(crate) fn upsert_credential(
        &self,
        mut input: JsonMap,
        study: &StudyRef,
    ) -> anyhow::Result<MutationOutcome<Credential>> {
        let study = self.resolve_study(study)?;
        let existing = match input.get("key").and_then(serde_json::Value::as_str) {
            Some(key) => self.find_credential(key, &study)?,
            None => None,
        };
        let outcome = if let Some(cred) = existing {
            for field in IMMUTABLE_CREDENTIAL_FIELDS {
                input.remove(field);
            }
            self.mutate(
                Action::Update,
                "credential",
                Mutation::new(
                    UPDATE_CREDENTIAL,
                    "credential",
                    input_variables(Some(&cred.id), input),
                ),
                DeleteSafety::Enforce,
            )?
        } else {
            input.insert("studyId".to_owned(), study.id.clone().into());
            self.mutate(
                Action::Create,
                "credential",
                Mutation::new(CREATE_CREDENTIAL, "credential", input_variables(None, input)),
                DeleteSafety::Enforce,
            )?
        };
        Ok(outcome.map(|mut cred: Credential| {
            cred.study_id = Some(study.id.clone());
            cred.study_global_id = Some(study.global_id.clone());
            cred
        }))
    }

    pub(crate) fn delete_credential(
        &self,
        cred: &CredentialRef,
        safety: DeleteSafety,
    ) -> anyhow::Result<MutationOutcome<Credential>> {
        let node_id = match cred {
            CredentialRef::Id(id) => id.clone(),
            CredentialRef::Key {
                key,
                study_global_id,
            } => {
                let study = self.resolve_study(&StudyRef::GlobalId(study_global_id.clone()))?;
                let Some(found) = self.find_credential(key, &study)? else {
                    tracing::warn!(
                        "Could not find Dewrangle ID for credential {key} in study {study_global_id}"
                    );
                    anyhow::bail!("credential {key} not found; delete aborted");
                };
                found.id
            }
        };
        self.mutate(
            Action::Delete,
            "credential",
            Mutation::new(DELETE_CREDENTIAL, "credential", id_variables(&node_id)).destructive(),
            safety,
        )
    }
}
