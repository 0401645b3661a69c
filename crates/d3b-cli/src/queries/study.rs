use super::NodeConnection;
use crate::types::Study;
use dewrangle::{EdgeList, Id, JsonMap, Query};
use indoc::indoc;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroUsize;

pub(crate) fn organization_studies(org_id: Id, page_size: NonZeroUsize) -> NodeConnection<Study> {
    NodeConnection::new(ORGANIZATION_STUDIES, org_id, "studies", "studies", page_size)
}

static ORGANIZATION_STUDIES: &str = indoc! {"
    query orgStudies($id: ID!, $first: Int, $after: ID) {
      node(id: $id) {
        id
        ... on Organization {
          name
          id
          studies(first: $first, after: $after) {
            totalCount
            pageInfo {
              hasNextPage
              endCursor
            }
            edges {
              cursor
              node {
                id
                globalId
                name
                studyFhirServers {
                  edges {
                    node {
                      id
                      ... on StudyFhirServer {
                        fhirServer {
                          id
                          name
                          url
                          type
                          authType
                        }
                      }
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
"};

pub(crate) static GET_STUDY: &str = indoc! {"
    query studyQuery($id: ID!) {
      node(id: $id) {
        id
        ... on Study {
          globalId
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

/// Search one organization's studies with a free-text filter, yielding the
/// first match
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct FindOrganizationStudy {
    org_id: Id,
    search: String,
}

impl FindOrganizationStudy {
    pub(crate) fn new(org_id: Id, search: String) -> FindOrganizationStudy {
        FindOrganizationStudy { org_id, search }
    }
}

impl Query for FindOrganizationStudy {
    type Output = Option<Study>;

    fn document(&self) -> &'static str {
        indoc! {"
            query studyQuery($id: ID!, $filter: StudyFilter!) {
              node(id: $id) {
                id
                ... on Organization {
                  name
                  studies(filter: $filter) {
                    edges {
                      node {
                        id
                        name
                        globalId
                      }
                    }
                  }
                }
              }
            }
        "}
    }

    fn variables(&self) -> JsonMap {
        JsonMap::from_iter([
            ("id".to_owned(), self.org_id.clone().into()),
            ("filter".to_owned(), json!({"query": self.search})),
        ])
    }

    fn parse_response(&self, mut data: JsonMap) -> Result<Option<Study>, serde_json::Error> {
        let node = serde_json::from_value::<Option<StudiesNode>>(
            data.remove("node").unwrap_or_default(),
        )?;
        Ok(node.and_then(|n| n.studies.0.into_iter().next()))
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct StudiesNode {
    #[serde(default)]
    studies: EdgeList<Study>,
}

pub(crate) static CREATE_STUDY: &str = indoc! {"
    mutation studyCreateMutation($input: StudyCreateInput!) {
      studyCreate(input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        study {
          id
          name
          globalId
        }
      }
    }
"};

pub(crate) static UPDATE_STUDY: &str = indoc! {"
    mutation studyUpdateMutation($id: ID!, $input: StudyUpdateInput!) {
      studyUpdate(id: $id, input: $input) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        study {
          id
          name
          globalId
        }
      }
    }
"};

pub(crate) static DELETE_STUDY: &str = indoc! {"
    mutation studyDeleteMutation($id: ID!) {
      studyDelete(id: $id) {
        errors {
          ... on MutationError {
            __typename
            message
            field
          }
        }
        study {
          id
          name
          globalId
        }
      }
    }
"};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_filter_match() {
        let q = FindOrganizationStudy::new(Id::from("org-1"), "sd-abc".into());
        assert_eq!(
            serde_json::Value::Object(q.variables()),
            json!({"id": "org-1", "filter": {"query": "sd-abc"}})
        );
        let study = q
            .parse_response(
                json!({
                    "node": {
                        "id": "org-1",
                        "name": "Org",
                        "studies": {"edges": [
                            {"node": {"id": "s1", "name": "A", "globalId": "sd-abc"}},
                            {"node": {"id": "s2", "name": "B", "globalId": "sd-abcd"}}
                        ]}
                    }
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(study.id, Id::from("s1"));
        assert_eq!(study.global_id, "sd-abc");
    }

    #[test]
    fn no_filter_match() {
        let q = FindOrganizationStudy::new(Id::from("org-1"), "sd-zzz".into());
        let study = q
            .parse_response(
                json!({"node": {"id": "org-1", "studies": {"edges": []}}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(study, None);
    }
}
