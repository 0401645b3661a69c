use dewrangle::{Id, JsonMap};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Organization {
    pub(crate) id: Id,
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) website: Option<String>,
    #[serde(flatten)]
    pub(crate) other: JsonMap,
}

/// A node referenced from another entity
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeRef {
    pub(crate) id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) global_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) key: Option<String>,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) kind: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Study {
    pub(crate) id: Id,
    pub(crate) name: String,
    pub(crate) global_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) organization: Option<NodeRef>,
    #[serde(
        default,
        rename = "organization_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) organization_id: Option<Id>,
    #[serde(default, rename = "kf_id", skip_serializing_if = "Option::is_none")]
    pub(crate) kf_id: Option<String>,
    #[serde(flatten)]
    pub(crate) other: JsonMap,
}

impl Study {
    /// The ID of the organization the study belongs to, from whichever of
    /// the nested or annotated forms is present
    pub(crate) fn organization_id(&self) -> Option<&Id> {
        self.organization
            .as_ref()
            .map(|org| &org.id)
            .or(self.organization_id.as_ref())
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Credential {
    pub(crate) id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    pub(crate) key: String,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) study: Option<NodeRef>,
    #[serde(
        default,
        rename = "study_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) study_id: Option<Id>,
    #[serde(
        default,
        rename = "study_global_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) study_global_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Volume {
    pub(crate) id: Id,
    /// The bucket name
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) region: Option<String>,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) study: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) credential: Option<NodeRef>,
    #[serde(
        default,
        rename = "study_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) study_id: Option<Id>,
    #[serde(
        default,
        rename = "study_global_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) study_global_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BillingGroup {
    pub(crate) id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    pub(crate) cavatica_billing_group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) organization: Option<NodeRef>,
    #[serde(
        default,
        rename = "organization_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) organization_id: Option<Id>,
}

/// A job as returned by the mutation that started it
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartedJob {
    pub(crate) id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) operation: Option<String>,
    #[serde(flatten)]
    pub(crate) other: JsonMap,
}
