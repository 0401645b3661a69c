use super::page_variables;
use crate::types::Organization;
use dewrangle::{Cursor, JsonMap, Page, Paginator, Query};
use indoc::indoc;
use serde::Deserialize;
use std::num::NonZeroUsize;

/// Page through the organizations the current user belongs to
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct GetOrganizations {
    page_size: NonZeroUsize,
}

impl GetOrganizations {
    pub(crate) fn new(page_size: NonZeroUsize) -> GetOrganizations {
        GetOrganizations { page_size }
    }
}

impl Paginator for GetOrganizations {
    type Query = GetOrganizationsQuery;
    type Item = Organization;

    fn noun(&self) -> &'static str {
        "organizations"
    }

    fn for_cursor(&self, cursor: Option<&Cursor>) -> GetOrganizationsQuery {
        GetOrganizationsQuery {
            page_size: self.page_size,
            cursor: cursor.cloned(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct GetOrganizationsQuery {
    page_size: NonZeroUsize,
    cursor: Option<Cursor>,
}

impl Query for GetOrganizationsQuery {
    type Output = Page<Organization>;

    fn document(&self) -> &'static str {
        indoc! {"
            query GetOrganizations($first: Int, $after: ID) {
              viewer {
                organizationUsers(first: $first, after: $after) {
                  totalCount
                  pageInfo {
                    hasNextPage
                    endCursor
                  }
                  edges {
                    cursor
                    node {
                      role
                      organization {
                        id
                        name
                        description
                        visibility
                        website
                        email
                        studies {
                          totalCount
                        }
                      }
                    }
                  }
                }
              }
            }
        "}
    }

    fn variables(&self) -> JsonMap {
        page_variables(None, self.page_size, self.cursor.as_ref())
    }

    fn parse_response(&self, mut data: JsonMap) -> Result<Page<Organization>, serde_json::Error> {
        let viewer = serde_json::from_value::<Viewer>(data.remove("viewer").unwrap_or_default())?;
        Ok(viewer
            .organization_users
            .map_items(|user| user.organization))
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Viewer {
    organization_users: Page<OrganizationUser>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct OrganizationUser {
    organization: Organization,
}

pub(crate) static CREATE_ORGANIZATION: &str = indoc! {"
    mutation organizationCreateMutation($input: OrganizationCreateInput!) {
      organizationCreate(input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        organization {
          id
          name
          description
          visibility
          website
          email
        }
      }
    }
"};

pub(crate) static UPDATE_ORGANIZATION: &str = indoc! {"
    mutation organizationUpdateMutation($id: ID!, $input: OrganizationUpdateInput!) {
      organizationUpdate(id: $id, input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        organization {
          id
          name
          description
          visibility
          website
          email
        }
      }
    }
"};

pub(crate) static DELETE_ORGANIZATION: &str = indoc! {"
    mutation organizationDeleteMutation($id: ID!) {
      organizationDelete(id: $id) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        organization {
          id
          name
        }
      }
    }
"};
