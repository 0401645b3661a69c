use super::{Action, Dewrangle};
use crate::output::write_json;
use crate::queries::{
    CREATE_BILLING_GROUP, DELETE_BILLING_GROUP, GET_BILLING_GROUP, NodeQuery, id_variables,
    input_variables, organization_billing_groups,
};
use crate::types::{BillingGroup, Organization};
use anyhow::Context;
use dewrangle::{DeleteSafety, Executor, Id, JsonMap, Mutation, MutationOutcome, drain};
use std::collections::BTreeMap;
use std::path::Path;

/// Billing groups keyed by Cavatica billing group ID
pub(crate) type BillingGroupMap = BTreeMap<String, BillingGroup>;

impl<E: Executor> Dewrangle<E> {
    pub(crate) fn paginate_billing_groups(
        &self,
        orgs: Option<&[Organization]>,
    ) -> anyhow::Result<BillingGroupMap> {
        let fetched;
        let orgs = match orgs {
            Some(orgs) => orgs,
            None => {
                fetched = self.paginate_organizations()?;
                &fetched
            }
        };
        tracing::info!("Paginating Dewrangle billing groups");
        let mut groups = BillingGroupMap::new();
        for org in orgs {
            drain(
                self.executor(),
                &organization_billing_groups(org.id.clone(), self.page_size),
                |page| {
                    for mut group in page {
                        group.organization_id = Some(org.id.clone());
                        groups.insert(group.cavatica_billing_group_id.clone(), group);
                    }
                },
            )
            .with_context(|| {
                format!("failed to fetch billing groups for organization {}", org.name)
            })?;
        }
        Ok(groups)
    }

    pub(crate) fn read_billing_groups(
        &self,
        output_dir: Option<&Path>,
    ) -> anyhow::Result<BillingGroupMap> {
        let groups = self.paginate_billing_groups(None)?;
        tracing::info!("Found {} billing groups", groups.len());
        if let Some(dir) = output_dir {
            write_json(dir, "BillingGroup", &groups)?;
        }
        Ok(groups)
    }

    pub(crate) fn read_billing_group(&self, id: &Id) -> anyhow::Result<BillingGroup> {
        let group = self
            .query(&NodeQuery::<BillingGroup>::new(GET_BILLING_GROUP, id.clone()))
            .with_context(|| format!("failed to fetch billing group {id}"))?
            .with_context(|| format!("billing group with ID {id} not found"))?;
        tracing::info!(
            "Found Dewrangle billing group {}",
            group.cavatica_billing_group_id
        );
        Ok(group)
    }

    pub(crate) fn find_billing_group(
        &self,
        cavatica_billing_group_id: &str,
    ) -> anyhow::Result<Option<BillingGroup>> {
        Ok(self
            .paginate_billing_groups(None)?
            .remove(cavatica_billing_group_id))
    }

    pub(crate) fn create_billing_group(
        &self,
        org_id: &Id,
        cavatica_billing_group_id: &str,
    ) -> anyhow::Result<MutationOutcome<BillingGroup>> {
        let input = JsonMap::from_iter([
            ("organizationId".to_owned(), org_id.clone().into()),
            (
                "cavaticaBillingGroupId".to_owned(),
                cavatica_billing_group_id.into(),
            ),
        ]);
        let outcome = self.mutate(
            Action::Create,
            "billing group",
            Mutation::new(CREATE_BILLING_GROUP, "billingGroup", input_variables(None, input)),
            DeleteSafety::Enforce,
        )?;
        Ok(outcome.map(|mut group: BillingGroup| {
            group.organization_id = Some(org_id.clone());
            group
        }))
    }

    /// Create the billing group, falling back to the existing one when
    /// Dewrangle rejects the creation
    pub(crate) fn create_or_find_billing_group(
        &self,
        org_id: &Id,
        cavatica_billing_group_id: &str,
    ) -> anyhow::Result<BillingGroup> {
        match self.create_billing_group(org_id, cavatica_billing_group_id)? {
            MutationOutcome::Succeeded(group) => Ok(group),
            MutationOutcome::Failed(errors) => self
                .find_billing_group(cavatica_billing_group_id)?
                .with_context(|| {
                    format!(
                        "billing group {cavatica_billing_group_id} could not be created or found:\n{errors}"
                    )
                }),
        }
    }

    pub(crate) fn delete_billing_group(
        &self,
        id: &Id,
        safety: DeleteSafety,
    ) -> anyhow::Result<MutationOutcome<BillingGroup>> {
        self.mutate(
            Action::Delete,
            "billing group",
            Mutation::new(DELETE_BILLING_GROUP, "billingGroup", id_variables(id)).destructive(),
            safety,
        )
    }
}
