use super::NodeConnection;
use crate::types::Volume;
use dewrangle::Id;
use indoc::indoc;
use std::num::NonZeroUsize;

pub(crate) fn study_volumes(study_id: Id, page_size: NonZeroUsize) -> NodeConnection<Volume> {
    NodeConnection::new(STUDY_VOLUMES, study_id, "volumes", "volumes", page_size)
}

static STUDY_VOLUMES: &str = indoc! {"
    query studyVolumes($id: ID!, $first: Int, $after: ID) {
      node(id: $id) {
        id
        ... on Study {
          name
          id
          globalId
          volumes(first: $first, after: $after) {
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
                region
                type
                pathPrefix
                study {
                  id
                  globalId
                }
                credential {
                  id
                  type
                  key
                }
              }
            }
          }
        }
      }
    }
"};

pub(crate) static GET_VOLUME: &str = indoc! {"
    query volumeQuery($id: ID!) {
      node(id: $id) {
        id
        ... on Volume {
          id
          name
          region
          type
          pathPrefix
          study {
            id
            globalId
          }
          credential {
            id
            type
            key
          }
        }
      }
    }
"};

pub(crate) static CREATE_VOLUME: &str = indoc! {"
    mutation volumeCreateMutation($input: VolumeCreateInput!) {
      volumeCreate(input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        volume {
          id
          name
          region
          type
          pathPrefix
          study {
            id
            globalId
          }
          credential {
            id
            type
            key
          }
        }
      }
    }
"};

pub(crate) static UPDATE_VOLUME: &str = indoc! {"
    mutation volumeUpdateMutation($id: ID!, $input: VolumeUpdateInput!) {
      volumeUpdate(id: $id, input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        volume {
          id
          name
          region
          type
          pathPrefix
          study {
            id
            globalId
          }
          credential {
            id
            type
            key
          }
        }
      }
    }
"};

pub(crate) static DELETE_VOLUME: &str = indoc! {"
    mutation volumeDeleteMutation($id: ID!) {
      volumeDelete(id: $id) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        volume {
          id
          name
          region
          type
          pathPrefix
        }
      }
    }
"};

pub(crate) static LIST_AND_HASH_VOLUME: &str = indoc! {"
    mutation volumeListAndHashMutation($id: ID!, $input: VolumeListAndHashInput!) {
      volumeListAndHash(id: $id, input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        job {
          id
          temporalWorkflowId
          operation
          target {
            id
          }
        }
      }
    }
"};
