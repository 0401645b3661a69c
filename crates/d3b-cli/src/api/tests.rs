use super::*;
use crate::types::Study;
use assert_matches::assert_matches;
use dewrangle::testing::{RecordingTransfer, ScriptedExecutor};
use dewrangle::{
    DeleteSafety, Destination, Id, JobOperation, JobOutcome, JsonMap, MutationOutcome,
    PollConfig, QueryError, QueryPayload, VolumeKey,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::time::Duration;

static LOCAL: &str = "http://localhost:4000";
static REMOTE: &str = "https://dewrangle.com";

fn client(base_url: &str) -> Dewrangle<ScriptedExecutor> {
    Dewrangle::new(ScriptedExecutor::new(base_url))
}

fn vars(payload: &QueryPayload) -> Value {
    Value::Object(payload.variables.clone())
}

fn obj(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn connection(items: &[Value], end_cursor: Option<&str>, has_next_page: bool, total: u64) -> Value {
    let edges = items
        .iter()
        .map(|node| json!({"cursor": "cur", "node": node}))
        .collect::<Vec<_>>();
    json!({
        "totalCount": total,
        "pageInfo": {"hasNextPage": has_next_page, "endCursor": end_cursor},
        "edges": edges,
    })
}

fn orgs_response(orgs: &[Value]) -> Value {
    let users = orgs
        .iter()
        .map(|org| json!({"role": "ADMIN", "organization": org}))
        .collect::<Vec<_>>();
    json!({"viewer": {"organizationUsers": connection(&users, None, false, users.len() as u64)}})
}

fn node_connection(field: &str, items: &[Value]) -> Value {
    json!({"node": {"id": "parent", field: connection(items, None, false, items.len() as u64)}})
}

fn kf_org() -> Value {
    json!({"id": "org-1", "name": "Kids First"})
}

fn study_abc() -> Value {
    json!({"id": "study-1", "name": "Study ABC", "globalId": "sd-abc"})
}

/// Script the organization and study listings that resolving a study by
/// global ID performs
fn push_study_lookup(executor: &ScriptedExecutor) {
    executor.push(orgs_response(&[kf_org()]));
    executor.push(node_connection("studies", &[study_abc()]));
}

fn job_node(completed_at: Option<&str>) -> Value {
    json!({
        "node": {
            "id": "job-1",
            "operation": "VOLUME_LIST_AND_HASH",
            "completedAt": completed_at,
            "errors": {"edges": []},
        }
    })
}

#[test]
fn paginate_organizations_follows_cursor() {
    let api = client(LOCAL);
    let users = |id: &str| json!({"role": "ADMIN", "organization": {"id": id, "name": id}});
    api.executor().push(json!({
        "viewer": {"organizationUsers": connection(&[users("org-1")], Some("c1"), true, 2)}
    }));
    api.executor().push(json!({
        "viewer": {"organizationUsers": connection(&[users("org-2")], Some("c2"), false, 2)}
    }));
    let orgs = api.paginate_organizations().unwrap();
    assert_eq!(
        orgs.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
        ["org-1", "org-2"]
    );
    let sent = api.executor().sent();
    assert_eq!(vars(&sent[0]), json!({"first": 10}));
    assert_eq!(vars(&sent[1]), json!({"first": 10, "after": "c1"}));
}

#[test]
fn upsert_organization_updates_existing_by_name() {
    let api = client(LOCAL);
    api.executor().push(orgs_response(&[kf_org()]));
    api.executor().push(json!({
        "organizationUpdate": {
            "errors": null,
            "organization": {"id": "org-1", "name": "Kids First", "email": "kf@example.com"}
        }
    }));
    let outcome = api
        .upsert_organization(obj(json!({"name": "Kids First", "email": "kf@example.com"})))
        .unwrap();
    let org = outcome.succeeded().unwrap();
    assert_eq!(org.email.as_deref(), Some("kf@example.com"));
    let sent = api.executor().sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].query.contains("organizationUpdate"));
    assert_eq!(
        vars(&sent[1]),
        json!({"id": "org-1", "input": {"name": "Kids First", "email": "kf@example.com"}})
    );
}

#[test]
fn upsert_organization_creates_when_absent() {
    let api = client(LOCAL);
    api.executor().push(orgs_response(&[kf_org()]));
    api.executor().push(json!({
        "organizationCreate": {
            "errors": [{"__typename": "MutationError", "message": "Name is taken", "field": "name"}],
            "organization": null
        }
    }));
    let outcome = api
        .upsert_organization(obj(json!({"name": "Other Org"})))
        .unwrap();
    assert_matches!(outcome, MutationOutcome::Failed(ref errors) if errors.0.len() == 1);
    let sent = api.executor().sent();
    assert!(sent[1].query.contains("organizationCreate"));
    assert_eq!(vars(&sent[1]), json!({"input": {"name": "Other Org"}}));
}

#[test]
fn upsert_organization_requires_name() {
    let api = client(LOCAL);
    assert!(api.upsert_organization(obj(json!({"email": "x@y.z"}))).is_err());
    assert!(api.executor().sent().is_empty());
}

#[test]
fn delete_refused_on_remote_host() {
    let api = client(REMOTE);
    let err = api
        .delete_organization(&OrganizationRef::Id(Id::from("org-1")), DeleteSafety::Enforce)
        .unwrap_err();
    assert_matches!(err.downcast_ref::<QueryError>(), Some(QueryError::Unsafe(_)));
    assert!(api.executor().sent().is_empty());
}

#[test]
fn delete_allowed_when_check_disabled() {
    let api = client(REMOTE);
    api.executor().push(json!({
        "organizationDelete": {"errors": null, "organization": {"id": "org-1", "name": "Kids First"}}
    }));
    let outcome = api
        .delete_organization(&OrganizationRef::Id(Id::from("org-1")), DeleteSafety::Disabled)
        .unwrap();
    assert_matches!(outcome, MutationOutcome::Succeeded(ref org) if org.id == Id::from("org-1"));
    assert_eq!(vars(&api.executor().sent()[0]), json!({"id": "org-1"}));
}

#[test]
fn delete_organization_by_unknown_name() {
    let api = client(LOCAL);
    api.executor().push(orgs_response(&[kf_org()]));
    let r = api.delete_organization(
        &OrganizationRef::Name("Nobody".into()),
        DeleteSafety::Enforce,
    );
    assert!(r.is_err());
    assert_eq!(api.executor().sent().len(), 1);
}

#[test]
fn read_studies_annotates_and_writes_output() {
    let tmpdir = tempfile::tempdir().unwrap();
    let api = client(LOCAL);
    api.executor().push(orgs_response(&[kf_org()]));
    api.executor().push(json!({
        "node": {"id": "org-1", "studies": connection(&[study_abc()], Some("c1"), true, 2)}
    }));
    api.executor().push(json!({
        "node": {
            "id": "org-1",
            "studies": connection(
                &[json!({"id": "study-2", "name": "Study XYZ", "globalId": "sd-xyz"})],
                Some("c2"),
                false,
                2,
            )
        }
    }));
    let studies = api.read_studies(Some(tmpdir.path())).unwrap();
    assert_eq!(studies.keys().collect::<Vec<_>>(), ["sd-abc", "sd-xyz"]);
    let abc = &studies["sd-abc"];
    assert_eq!(abc.kf_id.as_deref(), Some("SD_ABC"));
    assert_eq!(abc.organization_id(), Some(&Id::from("org-1")));
    let sent = api.executor().sent();
    assert_eq!(vars(&sent[2]), json!({"id": "org-1", "first": 10, "after": "c1"}));
    let written = serde_json::from_str::<Value>(
        &fs::read_to_string(tmpdir.path().join("Study.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written["sd-xyz"]["organization_id"], json!("org-1"));
    assert_eq!(written["sd-xyz"]["kf_id"], json!("SD_XYZ"));
}

#[test]
fn empty_connection_stops_immediately() {
    let api = client(LOCAL);
    api.executor().push(orgs_response(&[kf_org()]));
    api.executor().push(json!({
        "node": {"id": "org-1", "studies": connection(&[], Some("c1"), true, 0)}
    }));
    assert!(api.paginate_studies(None).unwrap().is_empty());
    assert_eq!(api.executor().remaining(), 0);
}

#[test]
fn upsert_study_cannot_change_organization() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    let r = api.upsert_study(
        obj(json!({"name": "Study ABC"})),
        &Id::from("org-2"),
        Some("SD_ABC"),
    );
    let e = r.unwrap_err();
    assert!(e.to_string().contains("already part of another organization"), "{e}");
    assert_eq!(api.executor().sent().len(), 2);
}

#[test]
fn upsert_study_creates_in_organization() {
    let api = client(LOCAL);
    api.executor().push(json!({
        "studyCreate": {
            "errors": null,
            "study": {"id": "study-9", "name": "New", "globalId": "sd-new"}
        }
    }));
    let outcome = api
        .upsert_study(obj(json!({"name": "New"})), &Id::from("org-1"), None)
        .unwrap();
    let study = outcome.succeeded().unwrap();
    assert_eq!(study.organization_id, Some(Id::from("org-1")));
    assert_eq!(
        vars(&api.executor().sent()[0]),
        json!({"input": {"name": "New", "organizationId": "org-1"}})
    );
}

#[test]
fn delete_study_with_unknown_kf_id() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    assert!(api.delete_study("SD_NOPE", DeleteSafety::Enforce).is_err());
    assert_eq!(api.executor().sent().len(), 2);
}

#[test]
fn delete_study_by_kf_id() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    api.executor().push(json!({
        "studyDelete": {"errors": null, "study": {"id": "study-1", "name": "Study ABC", "globalId": "sd-abc"}}
    }));
    let outcome = api.delete_study("SD_ABC", DeleteSafety::Enforce).unwrap();
    assert!(!outcome.is_failed());
    assert_eq!(vars(&api.executor().sent()[2]), json!({"id": "study-1"}));
}

#[test]
fn find_organization_study_by_kf_id() {
    let api = client(LOCAL);
    api.executor().push(json!({
        "node": {"id": "org-1", "studies": {"edges": [{"node": study_abc()}]}}
    }));
    let study = api
        .get_organization_study("SD_ABC", &Id::from("org-1"))
        .unwrap()
        .unwrap();
    assert_eq!(study.id, Id::from("study-1"));
    assert_eq!(
        vars(&api.executor().sent()[0]),
        json!({"id": "org-1", "filter": {"query": "sd-abc"}})
    );
}

#[test]
fn upsert_credential_updates_mutable_fields_only() {
    let api = client(LOCAL);
    api.executor().push(json!({"node": study_abc()}));
    api.executor().push(node_connection(
        "credentials",
        &[json!({"id": "cred-1", "name": "old", "key": "AKIA1", "type": "AWS"})],
    ));
    api.executor().push(json!({
        "credentialUpdate": {
            "errors": null,
            "credential": {"id": "cred-1", "name": "new", "key": "AKIA1", "type": "AWS"}
        }
    }));
    let input = obj(json!({
        "name": "new",
        "key": "AKIA1",
        "secret": "shh",
        "type": "AWS",
        "studyId": "study-1",
    }));
    let outcome = api
        .upsert_credential(input, &StudyRef::Id(Id::from("study-1")))
        .unwrap();
    let cred = outcome.succeeded().unwrap();
    assert_eq!(cred.study_global_id.as_deref(), Some("sd-abc"));
    assert_eq!(
        vars(&api.executor().sent()[2]),
        json!({"id": "cred-1", "input": {"name": "new"}})
    );
}

#[test]
fn paginate_credentials_nests_by_key_and_study() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    api.executor().push(node_connection(
        "credentials",
        &[
            json!({"id": "cred-1", "key": "AKIA1"}),
            json!({"id": "cred-2", "key": "AKIA2"}),
        ],
    ));
    let creds = api.paginate_credentials(None, None).unwrap();
    assert_eq!(creds.len(), 2);
    let cred = creds
        .get(&"AKIA2".to_owned(), &Id::from("study-1"))
        .unwrap();
    assert_eq!(cred.id, Id::from("cred-2"));
    assert_eq!(cred.study_id, Some(Id::from("study-1")));
}

#[test]
fn delete_credential_not_found() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    api.executor().push(node_connection("credentials", &[]));
    let r = api.delete_credential(
        &CredentialRef::Key {
            key: "AKIA1".into(),
            study_global_id: "sd-abc".into(),
        },
        DeleteSafety::Enforce,
    );
    assert!(r.is_err());
    assert_eq!(api.executor().remaining(), 0);
}

#[test]
fn paginate_volumes_keyed_by_bucket_and_prefix() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    api.executor().push(node_connection(
        "volumes",
        &[
            json!({"id": "vol-1", "name": "bucket-a", "pathPrefix": "raw"}),
            json!({"id": "vol-2", "name": "bucket-a"}),
        ],
    ));
    let volumes = api.paginate_volumes(None, None).unwrap();
    let study = Id::from("study-1");
    assert_eq!(
        volumes
            .get(&VolumeKey::new("bucket-a", Some("raw")), &study)
            .map(|v| v.id.as_str()),
        Some("vol-1")
    );
    assert_eq!(
        volumes
            .get(&VolumeKey::new("bucket-a", None), &study)
            .map(|v| v.id.as_str()),
        Some("vol-2")
    );
}

#[test]
fn upsert_volume_resolves_credential_by_key() {
    let api = client(LOCAL);
    push_study_lookup(api.executor());
    api.executor().push(node_connection(
        "credentials",
        &[json!({"id": "cred-1", "key": "AKIA1"})],
    ));
    api.executor().push(node_connection("volumes", &[]));
    api.executor().push(json!({
        "volumeCreate": {
            "errors": null,
            "volume": {"id": "vol-1", "name": "bucket-a", "region": "us-east-1"}
        }
    }));
    let outcome = api
        .upsert_volume(
            obj(json!({"name": "bucket-a", "region": "us-east-1"})),
            &StudyRef::GlobalId("sd-abc".into()),
            Some("AKIA1"),
        )
        .unwrap();
    let volume = outcome.succeeded().unwrap();
    assert_eq!(volume.study_id, Some(Id::from("study-1")));
    let sent = api.executor().sent();
    assert_eq!(sent.len(), 5);
    assert!(sent[4].query.contains("volumeCreate"));
    assert_eq!(
        vars(&sent[4]),
        json!({
            "input": {
                "name": "bucket-a",
                "region": "us-east-1",
                "credentialId": "cred-1",
                "studyId": "study-1",
            }
        })
    );
}

#[test]
fn upsert_existing_volume_only_changes_credential() {
    let api = client(LOCAL);
    api.executor().push(json!({"node": study_abc()}));
    api.executor().push(node_connection(
        "volumes",
        &[json!({"id": "vol-1", "name": "bucket-a", "pathPrefix": "raw"})],
    ));
    api.executor().push(json!({
        "volumeUpdate": {"errors": null, "volume": {"id": "vol-1", "name": "bucket-a"}}
    }));
    api.upsert_volume(
        obj(json!({"name": "bucket-a", "pathPrefix": "raw", "credentialId": "cred-2"})),
        &StudyRef::Id(Id::from("study-1")),
        None,
    )
    .unwrap();
    assert_eq!(
        vars(&api.executor().sent()[2]),
        json!({"id": "vol-1", "input": {"credentialId": "cred-2"}})
    );
}

#[test]
fn list_and_hash_requires_billing_group() {
    let api = client(LOCAL);
    let r = api.list_and_hash_volume("  ", &VolumeRef::Id(Id::from("vol-1")));
    assert!(r.is_err());
    assert!(api.executor().sent().is_empty());
}

#[test]
fn hash_volume_and_wait_polls_until_complete() {
    let api = client(LOCAL);
    api.executor().push(json!({
        "volumeListAndHash": {
            "errors": [],
            "job": {"id": "job-1", "operation": "VOLUME_LIST_AND_HASH", "temporalWorkflowId": "wf"}
        }
    }));
    api.executor().push(job_node(None));
    api.executor().push(job_node(Some("2024-05-01T00:00:00Z")));
    let config = PollConfig {
        timeout: None,
        interval: Duration::ZERO,
    };
    let result = api
        .hash_volume_and_wait("bg-1", &VolumeRef::Id(Id::from("vol-1")), &config)
        .unwrap();
    assert_eq!(result.outcome, JobOutcome::Succeeded);
    assert_eq!(result.job.operation, JobOperation::VolumeListAndHash);
    let sent = api.executor().sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(
        vars(&sent[0]),
        json!({"id": "vol-1", "input": {"billingGroupId": "bg-1"}})
    );
    assert_eq!(vars(&sent[1]), json!({"id": "job-1"}));
}

#[test]
fn create_or_find_billing_group_falls_back_to_existing() {
    let api = client(LOCAL);
    api.executor().push(json!({
        "billingGroupCreate": {
            "errors": [{"__typename": "MutationError", "message": "already exists", "field": null}],
            "billingGroup": null
        }
    }));
    api.executor().push(orgs_response(&[kf_org()]));
    api.executor().push(node_connection(
        "billingGroups",
        &[json!({"id": "bg-node", "name": "KF billing", "cavaticaBillingGroupId": "cav-1"})],
    ));
    let group = api
        .create_or_find_billing_group(&Id::from("org-1"), "cav-1")
        .unwrap();
    assert_eq!(group.id, Id::from("bg-node"));
    assert_eq!(group.organization_id, Some(Id::from("org-1")));
    assert_eq!(
        vars(&api.executor().sent()[0]),
        json!({"input": {"organizationId": "org-1", "cavaticaBillingGroupId": "cav-1"}})
    );
}

#[test]
fn read_job_writes_named_output() {
    let tmpdir = tempfile::tempdir().unwrap();
    let api = client(LOCAL);
    api.executor().push(json!({
        "node": {
            "id": "job-1",
            "operation": "VOLUME_LIST_AND_HASH",
            "completedAt": "2024-05-01T00:00:00Z",
            "errors": {"edges": [{"node": {"id": "e1", "name": "Error", "message": "bad bucket"}}]},
        }
    }));
    let job = api.read_job(&Id::from("job-1"), Some(tmpdir.path())).unwrap();
    assert_eq!(job.errors.0.len(), 1);
    let path = tmpdir.path().join("Job-volume-list-and-hash.json");
    let written = serde_json::from_str::<Value>(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(
        written["errors"]["edges"][0]["node"]["message"],
        json!("bad bucket")
    );
}

#[test]
fn upsert_and_download_global_descriptors() {
    let tmpdir = tempfile::tempdir().unwrap();
    let csv = tmpdir.path().join("descriptors.csv");
    fs::write(&csv, "fhirResourceType,descriptor\nPatient,Patient-1\n").unwrap();
    let outdir = tmpdir.path().join("out");
    let api = client(LOCAL);
    api.executor().push(json!({"node": study_abc()}));
    api.executor().push(json!({
        "globalDescriptorUpsert": {
            "errors": null,
            "job": {
                "id": "job-9",
                "operation": "GLOBAL_DESCRIPTOR_UPSERT",
                "completedAt": null,
                "errors": {"edges": []}
            }
        }
    }));
    api.executor().push(json!({"node": study_abc()}));
    let transfer = RecordingTransfer::new(json!({"id": "sf-1"}))
        .with_download(Some("global-ids.csv"), "descriptor,globalId\nPatient-1,pt-1\n");
    let path = api
        .upsert_and_download_global_descriptors(
            &transfer,
            &csv,
            &StudyRef::Id(Id::from("study-1")),
            false,
            DescriptorSelection::All,
            &Destination::Directory(outdir.clone()),
        )
        .unwrap();
    assert_eq!(path, outdir.join("global-ids.csv"));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "descriptor,globalId\nPatient-1,pt-1\n"
    );
    let uploads = transfer.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(
        uploads[0].0.url,
        "http://localhost:4000/api/rest/studies/study-1/files/descriptors.csv"
    );
    assert_eq!(
        vars(&api.executor().sent()[1]),
        json!({"input": {"studyFileId": "sf-1", "skipUnavailableDescriptors": false}})
    );
    let downloads = transfer.downloads();
    assert_eq!(
        downloads[0].0.url,
        "http://localhost:4000/api/rest/studies/study-1/global-descriptors"
    );
    assert_eq!(
        downloads[0].0.params,
        [
            ("job".to_owned(), "job-9".to_owned()),
            ("descriptors".to_owned(), "all".to_owned()),
        ]
    );
}

#[test]
fn upload_without_file_id_is_error() {
    let tmpdir = tempfile::tempdir().unwrap();
    let csv = tmpdir.path().join("descriptors.csv");
    fs::write(&csv, "fhirResourceType,descriptor\n").unwrap();
    let api = client(LOCAL);
    api.executor().push(json!({"node": study_abc()}));
    let transfer = RecordingTransfer::new(json!({"message": "bad file"}));
    let r =
        api.upsert_global_descriptors(&transfer, &csv, &StudyRef::Id(Id::from("study-1")), true);
    assert!(r.is_err());
    assert_eq!(api.executor().sent().len(), 1);
}

#[test]
fn download_job_errors_to_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dest = tmpdir.path().join("errors.csv");
    let api = client(LOCAL);
    let transfer = RecordingTransfer::new(json!({})).with_download(None, "id,message\n");
    let path = api
        .download_job_errors(&transfer, &Id::from("job-1"), &Destination::File(dest.clone()))
        .unwrap();
    assert_eq!(path, dest);
    assert_eq!(
        transfer.downloads()[0].0.url,
        "http://localhost:4000/api/rest/jobs/job-1/errors"
    );
}

#[test]
fn study_ref_requires_an_id() {
    assert!(StudyRef::from_options(None, None).is_err());
    assert_eq!(
        StudyRef::from_options(Some("study-1".into()), Some("sd-abc".into())).unwrap(),
        StudyRef::Id(Id::from("study-1"))
    );
}

#[test]
fn study_from_json_keeps_extra_fields() {
    let study = serde_json::from_value::<Study>(json!({
        "id": "study-1",
        "name": "Study ABC",
        "globalId": "sd-abc",
        "studyFhirServers": {"edges": []},
    }))
    .unwrap();
    assert!(study.other.contains_key("studyFhirServers"));
}
