use super::NodeConnection;
use crate::types::Credential;
use dewrangle::Id;
use indoc::indoc;
use std::num::NonZeroUsize;

pub(crate) fn study_credentials(
    study_id: Id,
    page_size: NonZeroUsize,
) -> NodeConnection<Credential> {
    NodeConnection::new(
        STUDY_CREDENTIALS,
        study_id,
        "credentials",
        "credentials",
        page_size,
    )
}

static STUDY_CREDENTIALS: &str = indoc! {"
    query studyCredentials($id: ID!, $first: Int, $after: ID) {
      node(id: $id) {
        id
        ... on Study {
          name
          id
          globalId
          credentials(first: $first, after: $after) {
            totalCount
            pageInfo {
              hasNextPage
              endCursor
            }
            edges {
              cursor
              node {
                id
                name
                key
                type
              }
            }
          }
        }
      }
    }
"};

pub(crate) static GET_CREDENTIAL: &str = indoc! {"
    query credentialQuery($id: ID!) {
      node(id: $id) {
        id
        ... on Credential {
          id
          name
          key
          type
          study {
            name
            id
            globalId
          }
        }
      }
    }
"};

pub(crate) static CREATE_CREDENTIAL: &str = indoc! {"
    mutation credentialCreateMutation($input: CredentialCreateInput!) {
      credentialCreate(input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        credential {
          id
          name
          key
          type
          study {
            name
            id
            globalId
          }
        }
      }
    }
"};

pub(crate) static UPDATE_CREDENTIAL: &str = indoc! {"
    mutation credentialUpdateMutation($id: ID!, $input: CredentialUpdateInput!) {
      credentialUpdate(id: $id, input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        credential {
          id
          name
          key
          type
          study {
            name
            id
            globalId
          }
        }
      }
    }
"};

pub(crate) static DELETE_CREDENTIAL: &str = indoc! {"
    mutation credentialDeleteMutation($id: ID!) {
      credentialDelete(id: $id) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        credential {
          id
          name
          key
          study {
            name
            id
            globalId
          }
        }
      }
    }
"};
