use super::{Action, Dewrangle};
use crate::output::write_json;
use crate::queries::{
    CREATE_ORGANIZATION, DELETE_ORGANIZATION, GetOrganizations, UPDATE_ORGANIZATION,
    id_variables, input_variables,
};
use crate::types::Organization;
use anyhow::Context;
use dewrangle::{DeleteSafety, Executor, Id, JsonMap, Mutation, MutationOutcome, collect_all};
use std::fmt;
use std::path::Path;

/// How an organization is identified on the command line
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum OrganizationRef {
    Id(Id),
    Name(String),
}

impl OrganizationRef {
    fn matches(&self, org: &Organization) -> bool {
        match self {
            OrganizationRef::Id(id) => &org.id == id,
            OrganizationRef::Name(name) => &org.name == name,
        }
    }
}

impl fmt::Display for OrganizationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganizationRef::Id(id) => write!(f, "with ID {id}"),
            OrganizationRef::Name(name) => write!(f, "named {name:?}"),
        }
    }
}

impl<E: Executor> Dewrangle<E> {
    /// Fetch every organization the current user belongs to
    pub(crate) fn paginate_organizations(&self) -> anyhow::Result<Vec<Organization>> {
        tracing::info!("Paginating Dewrangle organizations");
        collect_all(self.executor(), &GetOrganizations::new(self.page_size))
            .context("failed to fetch organizations")
    }

    pub(crate) fn read_organizations(
        &self,
        output_dir: Option<&Path>,
    ) -> anyhow::Result<Vec<Organization>> {
        let orgs = self.paginate_organizations()?;
        tracing::info!("Found {} organizations", orgs.len());
        if let Some(dir) = output_dir {
            write_json(dir, "Organization", &orgs)?;
        }
        Ok(orgs)
    }

    pub(crate) fn find_organization(
        &self,
        org: &OrganizationRef,
    ) -> anyhow::Result<Option<Organization>> {
        Ok(self
            .paginate_organizations()?
            .into_iter()
            .find(|o| org.matches(o)))
    }

    /// Update the organization with the same name as `input`, or create it
    /// if there is none
    pub(crate) fn upsert_organization(
        &self,
        input: JsonMap,
    ) -> anyhow::Result<MutationOutcome<Organization>> {
        let Some(name) = input.get("name").and_then(serde_json::Value::as_str) else {
            anyhow::bail!("organization input must include a \"name\"");
        };
        match self.find_organization(&OrganizationRef::Name(name.to_owned()))? {
            Some(org) => self.mutate(
                Action::Update,
                "organization",
                Mutation::new(
                    UPDATE_ORGANIZATION,
                    "organization",
                    input_variables(Some(&org.id), input),
                ),
                DeleteSafety::Enforce,
            ),
            None => self.mutate(
                Action::Create,
                "organization",
                Mutation::new(CREATE_ORGANIZATION, "organization", input_variables(None, input)),
                DeleteSafety::Enforce,
            ),
        }
    }

    pub(crate) fn delete_organization(
        &self,
        org: &OrganizationRef,
        safety: DeleteSafety,
    ) -> anyhow::Result<MutationOutcome<Organization>> {
        let id = match org {
            OrganizationRef::Id(id) => id.clone(),
            OrganizationRef::Name(_) => {
                self.find_organization(org)?
                    .with_context(|| format!("organization {org} not found; delete aborted"))?
                    .id
            }
        };
        self.mutate(
            Action::Delete,
            "organization",
            Mutation::new(DELETE_ORGANIZATION, "organization", id_variables(&id)).destructive(),
            safety,
        )
    }
}
