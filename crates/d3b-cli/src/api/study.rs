use super::{Action, Dewrangle};
use crate::ids::{global_id_to_kf_id, is_kf_study_id, kf_id_to_global_id, study_global_id};
use crate::output::write_json;
use crate::queries::{
    CREATE_STUDY, DELETE_STUDY, FindOrganizationStudy, GET_STUDY, NodeQuery, UPDATE_STUDY,
    id_variables, input_variables, organization_studies,
};
use crate::types::{Organization, Study};
use anyhow::Context;
use dewrangle::{DeleteSafety, Executor, Id, JsonMap, Mutation, MutationOutcome, drain};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Studies keyed by global ID
pub(crate) type StudyMap = BTreeMap<String, Study>;

/// How a study is identified on the command line
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum StudyRef {
    /// Dewrangle GraphQL node ID
    Id(Id),
    GlobalId(String),
}

impl StudyRef {
    /// Build from whichever of a node ID or a global ID was supplied,
    /// preferring the node ID
    pub(crate) fn from_options(
        study_id: Option<String>,
        study_global_id: Option<String>,
    ) -> anyhow::Result<StudyRef> {
        match (study_id, study_global_id) {
            (Some(id), _) => Ok(StudyRef::Id(Id::from(id))),
            (None, Some(global_id)) => Ok(StudyRef::GlobalId(global_id)),
            (None, None) => {
                anyhow::bail!("either the Dewrangle node ID or the global ID of the study is required")
            }
        }
    }
}

impl fmt::Display for StudyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyRef::Id(id) => write!(f, "with ID {id}"),
            StudyRef::GlobalId(global_id) => write!(f, "with global ID {global_id}"),
        }
    }
}

impl<E: Executor> Dewrangle<E> {
    /// Fetch every study in `orgs` (all of the user's organizations if not
    /// given), annotated with its organization and Kids First ID
    pub(crate) fn paginate_studies(
        &self,
        orgs: Option<&[Organization]>,
    ) -> anyhow::Result<StudyMap> {
        let fetched;
        let orgs = match orgs {
            Some(orgs) => orgs,
            None => {
                fetched = self.paginate_organizations()?;
                &fetched
            }
        };
        tracing::info!("Paginating Dewrangle studies");
        let mut studies = StudyMap::new();
        for org in orgs {
            drain(
                self.executor(),
                &organization_studies(org.id.clone(), self.page_size),
                |page| {
                    for mut study in page {
                        study.organization_id = Some(org.id.clone());
                        study.kf_id = Some(global_id_to_kf_id(&study.global_id));
                        studies.insert(study.global_id.clone(), study);
                    }
                },
            )
            .with_context(|| format!("failed to fetch studies for organization {}", org.name))?;
        }
        Ok(studies)
    }

    pub(crate) fn read_studies(&self, output_dir: Option<&Path>) -> anyhow::Result<StudyMap> {
        let studies = self.paginate_studies(None)?;
        tracing::info!("Found {} studies", studies.len());
        if let Some(dir) = output_dir {
            write_json(dir, "Study", &studies)?;
        }
        Ok(studies)
    }

    pub(crate) fn read_study(&self, id: &Id) -> anyhow::Result<Study> {
        let study = self
            .query(&NodeQuery::<Study>::new(GET_STUDY, id.clone()))
            .with_context(|| format!("failed to fetch study {id}"))?
            .with_context(|| format!("study with ID {id} not found"))?;
        tracing::info!("Found Dewrangle study {}", study.global_id);
        Ok(study)
    }

    /// Find a study by global ID when its organization is not known
    pub(crate) fn find_study(&self, global_id: &str) -> anyhow::Result<Option<Study>> {
        Ok(self.paginate_studies(None)?.remove(global_id))
    }

    pub(crate) fn resolve_study(&self, study: &StudyRef) -> anyhow::Result<Study> {
        match study {
            StudyRef::Id(id) => self.read_study(id),
            StudyRef::GlobalId(global_id) => self
                .find_study(global_id)?
                .with_context(|| format!("study {study} does not exist in Dewrangle")),
        }
    }

    /// Look up a study by Kids First ID or global ID within one organization
    pub(crate) fn get_organization_study(
        &self,
        study_id: &str,
        org_id: &Id,
    ) -> anyhow::Result<Option<Study>> {
        let global_id = study_global_id(study_id);
        let study = self
            .query(&FindOrganizationStudy::new(org_id.clone(), global_id.clone()))
            .with_context(|| {
                format!("failed to search organization {org_id} for study {global_id}")
            })?;
        if study.is_none() {
            tracing::error!("Study {global_id} not found in organization {org_id}");
        }
        Ok(study)
    }

    /// Create or update a study in organization `org_id`.  An existing study
    /// is found through `study_id` (a Kids First ID) or the `globalId` in
    /// `input`, and may not be moved to another organization.
    pub(crate) fn upsert_study(
        &self,
        mut input: JsonMap,
        org_id: &Id,
        study_id: Option<&str>,
    ) -> anyhow::Result<MutationOutcome<Study>> {
        let global_id = study_id
            .filter(|s| is_kf_study_id(s))
            .map(kf_id_to_global_id)
            .or_else(|| {
                input
                    .get("globalId")
                    .and_then(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
            })
            .filter(|s| !s.is_empty());
        let existing = match global_id {
            Some(ref global_id) => self.find_study(global_id)?,
            None => None,
        };
        let outcome = if let Some(study) = existing {
            if let Some(current) = study.organization_id()
                && current != org_id
            {
                anyhow::bail!(
                    "study {} is already part of another organization: {current}. You cannot change its organization",
                    study.global_id
                );
            }
            self.mutate(
                Action::Update,
                "study",
                Mutation::new(UPDATE_STUDY, "study", input_variables(Some(&study.id), input)),
                DeleteSafety::Enforce,
            )?
        } else {
            input.insert("organizationId".to_owned(), org_id.clone().into());
            self.mutate(
                Action::Create,
                "study",
                Mutation::new(CREATE_STUDY, "study", input_variables(None, input)),
                DeleteSafety::Enforce,
            )?
        };
        Ok(outcome.map(|mut study: Study| {
            study.organization_id = Some(org_id.clone());
            study
        }))
    }

    /// Delete a study identified by Kids First ID or Dewrangle node ID
    pub(crate) fn delete_study(
        &self,
        study_id: &str,
        safety: DeleteSafety,
    ) -> anyhow::Result<MutationOutcome<Study>> {
        let node_id = if is_kf_study_id(study_id) {
            let Some(study) = self.find_study(&kf_id_to_global_id(study_id))? else {
                tracing::warn!("Could not find Dewrangle ID for study {study_id}");
                anyhow::bail!("study {study_id} not found; delete aborted");
            };
            study.id
        } else {
            Id::from(study_id)
        };
        self.mutate(
            Action::Delete,
            "study",
            Mutation::new(DELETE_STUDY, "study", id_variables(&node_id)).destructive(),
            safety,
        )
    }
}
