use crate::queries::Query;
use crate::types::{EdgeList, Id, JsonMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote asynchronous operation.  `completed_at` is set exactly once,
/// when the job finishes; errors may be attached before that.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Id,
    pub operation: JobOperation,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub errors: EdgeList<JobError>,
}

impl Job {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JobError {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum JobOperation {
    VolumeListAndHash,
    GlobalDescriptorUpsert,
    Other(String),
}

impl JobOperation {
    pub fn as_str(&self) -> &str {
        match self {
            JobOperation::VolumeListAndHash => "VOLUME_LIST_AND_HASH",
            JobOperation::GlobalDescriptorUpsert => "GLOBAL_DESCRIPTOR_UPSERT",
            JobOperation::Other(s) => s,
        }
    }

    /// The operation name in lowercase with hyphens, as used in file names
    /// (e.g., `volume-list-and-hash`)
    pub fn kebab_name(&self) -> String {
        self.as_str().to_lowercase().replace('_', "-")
    }
}

impl fmt::Display for JobOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobOperation {
    fn from(value: String) -> JobOperation {
        match value.as_str() {
            "VOLUME_LIST_AND_HASH" => JobOperation::VolumeListAndHash,
            "GLOBAL_DESCRIPTOR_UPSERT" => JobOperation::GlobalDescriptorUpsert,
            _ => JobOperation::Other(value),
        }
    }
}

impl From<JobOperation> for String {
    fn from(value: JobOperation) -> String {
        match value {
            JobOperation::Other(s) => s,
            op => op.as_str().to_owned(),
        }
    }
}

/// Fetch a single job by node ID
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobQuery {
    pub id: Id,
}

impl JobQuery {
    pub fn new<I: Into<Id>>(id: I) -> JobQuery {
        JobQuery { id: id.into() }
    }
}

impl Query for JobQuery {
    type Output = Option<Job>;

    fn document(&self) -> &'static str {
        JOB_QUERY
    }

    fn variables(&self) -> JsonMap {
        JsonMap::from_iter([("id".to_owned(), self.id.clone().into())])
    }

    fn parse_response(&self, mut data: JsonMap) -> Result<Option<Job>, serde_json::Error> {
        serde_json::from_value(data.remove("node").unwrap_or_default())
    }
}

static JOB_QUERY: &str = "\
query jobQuery($id: ID!) {
  node(id: $id) {
    id
    ... on Job {
      id
      operation
      completedAt
      errors {
        edges {
          node {
            id
            name
            message
          }
        }
      }
    }
  }
}
";
