use super::NodeConnection;
use crate::types::BillingGroup;
use dewrangle::Id;
use indoc::indoc;
use std::num::NonZeroUsize;

pub(crate) fn organization_billing_groups(
    org_id: Id,
    page_size: NonZeroUsize,
) -> NodeConnection<BillingGroup> {
    NodeConnection::new(
        ORGANIZATION_BILLING_GROUPS,
        org_id,
        "billingGroups",
        "billing groups",
        page_size,
    )
}

static ORGANIZATION_BILLING_GROUPS: &str = indoc! {"
    query orgBillingGroups($id: ID!, $first: Int, $after: ID) {
      node(id: $id) {
        id
        ... on Organization {
          name
          id
          billingGroups(first: $first, after: $after) {
            totalCount
            pageInfo {
              hasNextPage
              endCursor
            }
            edges {
              cursor
              node {
                id
                cavaticaBillingGroupId
                name
              }
            }
          }
        }
      }
    }
"};

pub(crate) static GET_BILLING_GROUP: &str = indoc! {"
    query BillingGroupQuery($id: ID!) {
      node(id: $id) {
        id
        ... on BillingGroup {
          cavaticaBillingGroupId
          name
          id
          organization {
            name
            id
          }
        }
      }
    }
"};

pub(crate) static CREATE_BILLING_GROUP: &str = indoc! {"
    mutation billingGroupCreateMutation($input: BillingGroupCreateInput!) {
      billingGroupCreate(input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        billingGroup {
          id
          name
          cavaticaBillingGroupId
        }
      }
    }
"};

pub(crate) static DELETE_BILLING_GROUP: &str = indoc! {"
    mutation billingGroupDeleteMutation($id: ID!) {
      billingGroupDelete(id: $id) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        billingGroup {
          id
          name
          cavaticaBillingGroupId
        }
      }
    }
"};
