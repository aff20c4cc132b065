//! Adapter behaviour against the in-memory run store and a mocked workspace.
//!
//! The in-memory tests cover submit/lookup correlation, ordering and the
//! not-found rules. The mocked tests drive `connect` end to end over HTTP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use luna_aml::{
    Error, ExperimentSettings, InMemoryRunBackend, OperationsAdapter, RunRecord,
    SubmitOperationRequest, WorkspaceConfig, tags,
};
use luna_config::{DEFAULT_RUN_TYPE, HttpSection, StaticSecretStore};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPERIMENT: &str = "myexperiment";

fn setup() -> (OperationsAdapter, Arc<InMemoryRunBackend>) {
    let backend = Arc::new(InMemoryRunBackend::new());
    let adapter = OperationsAdapter::with_backend(backend.clone(), ExperimentSettings::default());
    (adapter, backend)
}

fn request(entry_point: &str, user_id: &str) -> SubmitOperationRequest {
    SubmitOperationRequest {
        product_name: "churn".into(),
        deployment_name: "prod".into(),
        api_version: "v1".into(),
        entry_point: entry_point.into(),
        user_input: r#"{"epochs":3}"#.into(),
        predecessor_operation_id: None,
        user_id: user_id.into(),
        subscription_id: "sub-1".into(),
    }
}

fn tagged_run(run_id: &str, status: &str, operation_name: &str, operation_id: &str) -> RunRecord {
    RunRecord::new(run_id, status)
        .with_run_type(DEFAULT_RUN_TYPE)
        .with_tag(tags::USER_ID, "user-1")
        .with_tag(tags::SUBSCRIPTION_ID, "sub-1")
        .with_tag(tags::OPERATION_NAME, operation_name)
        .with_tag(tags::OPERATION_ID, operation_id)
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_submit_then_status() {
    let (adapter, backend) = setup();

    let operation_id = adapter
        .submit_operation(request("train", "user-1"))
        .await
        .unwrap();

    let status = adapter
        .get_operation_status("train", operation_id.as_str(), "user-1", "sub-1")
        .await
        .unwrap();
    assert_eq!(status.operation_id, operation_id.as_str());
    assert_eq!(status.status, "NotStarted");

    backend.set_status(&format!("{}_1", EXPERIMENT), "Completed").unwrap();
    let status = adapter
        .get_operation_status("train", operation_id.as_str(), "user-1", "sub-1")
        .await
        .unwrap();
    assert_eq!(status.status, "Completed");
}

#[tokio::test]
async fn test_submit_records_parameters_and_tags() {
    let (adapter, backend) = setup();

    let mut req = request("score", "user-1");
    req.predecessor_operation_id = Some("a-earlier".into());
    let operation_id = adapter.submit_operation(req).await.unwrap();

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    let submission = &submissions[0];
    assert_eq!(submission.experiment, EXPERIMENT);
    assert_eq!(submission.entry_point, "score");

    assert_eq!(submission.parameters[tags::MODEL_ID], operation_id.as_str());
    assert_eq!(submission.parameters[tags::OPERATION_ID], operation_id.as_str());
    assert_eq!(submission.parameters[tags::USER_INPUT], r#"{"epochs":3}"#);
    assert!(!submission.parameters.contains_key(tags::USER_ID));

    assert_eq!(submission.tags[tags::OPERATION_NAME], "score");
    assert_eq!(submission.tags[tags::OPERATION_ID], operation_id.as_str());
    assert_eq!(submission.tags[tags::USER_ID], "user-1");

    // The predecessor is never forwarded.
    assert!(submission.parameters.values().all(|v| v != "a-earlier"));
    assert!(submission.tags.values().all(|v| v != "a-earlier"));
}

#[tokio::test]
async fn test_submitted_ids_are_fresh() {
    let (adapter, _backend) = setup();
    let first = adapter.submit_operation(request("train", "user-1")).await.unwrap();
    let second = adapter.submit_operation(request("train", "user-1")).await.unwrap();
    assert_ne!(first, second);
    assert!(first.as_str().starts_with('a'));
    assert_eq!(first.as_str().len(), 32);
}

#[tokio::test]
async fn test_list_preserves_backend_order() {
    let (adapter, backend) = setup();
    backend.add_run(EXPERIMENT, tagged_run("r1", "Completed", "train", "a1"));
    backend.add_run(EXPERIMENT, tagged_run("r2", "Running", "train", "a2"));
    backend.add_run(EXPERIMENT, tagged_run("r3", "Failed", "train", "a3"));

    let statuses = adapter.list_operations("train", "user-1", "sub-1").await.unwrap();
    let pairs: Vec<_> = statuses
        .iter()
        .map(|s| (s.operation_id.as_str(), s.status.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("a1", "Completed"), ("a2", "Running"), ("a3", "Failed")]
    );
}

#[tokio::test]
async fn test_list_is_scoped_by_user_and_operation() {
    let (adapter, backend) = setup();
    backend.add_run(EXPERIMENT, tagged_run("r1", "Completed", "train", "a1"));
    backend.add_run(EXPERIMENT, tagged_run("r2", "Completed", "score", "a2"));
    backend.add_run(
        EXPERIMENT,
        tagged_run("r3", "Completed", "train", "a3").with_tag(tags::USER_ID, "someone-else"),
    );

    let statuses = adapter.list_operations("train", "user-1", "sub-1").await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].operation_id, "a1");
}

#[tokio::test]
async fn test_list_ignores_other_run_types() {
    let (adapter, backend) = setup();
    backend.add_run(
        EXPERIMENT,
        tagged_run("r1", "Completed", "train", "a1").with_run_type("azureml.StepRun"),
    );

    let err = adapter
        .list_operations("train", "user-1", "sub-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OperationNotFound { .. }));
}

#[tokio::test]
async fn test_no_match_is_not_found_everywhere() {
    let (adapter, _backend) = setup();

    assert!(
        adapter
            .get_operation_status("train", "a1", "user-1", "sub-1")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        adapter
            .list_operations("train", "user-1", "sub-1")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        adapter
            .get_operation_output("train", "a1", "user-1", "sub-1")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        adapter
            .list_operation_outputs("train", "user-1", "sub-1")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_output_reads_first_child() {
    let (adapter, backend) = setup();
    backend.add_run(EXPERIMENT, tagged_run("r1", "Completed", "train", "a1"));
    backend
        .add_child("r1", RunRecord::new("r1_step0", "Completed"))
        .unwrap();
    backend
        .add_child("r1", RunRecord::new("r1_step1", "Completed"))
        .unwrap();
    backend
        .set_files("r1_step0", vec!["outputs/model.pkl".into(), "logs/driver.txt".into()])
        .unwrap();
    backend
        .set_files("r1_step1", vec!["outputs/ignored.txt".into()])
        .unwrap();

    let output = adapter
        .get_operation_output("train", "a1", "user-1", "sub-1")
        .await
        .unwrap();
    assert_eq!(output.operation_id, "a1");
    assert_eq!(output.files, vec!["outputs/model.pkl", "logs/driver.txt"]);
}

#[tokio::test]
async fn test_output_of_child_without_files_is_empty() {
    let (adapter, backend) = setup();
    backend.add_run(EXPERIMENT, tagged_run("r1", "Running", "train", "a1"));
    backend
        .add_child("r1", RunRecord::new("r1_step0", "Running"))
        .unwrap();

    let output = adapter
        .get_operation_output("train", "a1", "user-1", "sub-1")
        .await
        .unwrap();
    assert!(output.files.is_empty());
}

#[tokio::test]
async fn test_list_outputs() {
    let (adapter, backend) = setup();
    for (run, op, file) in [("r1", "a1", "one.csv"), ("r2", "a2", "two.csv")] {
        backend.add_run(EXPERIMENT, tagged_run(run, "Completed", "score", op));
        let child = format!("{}_child", run);
        backend
            .add_child(run, RunRecord::new(&child, "Completed"))
            .unwrap();
        backend.set_files(&child, vec![file.to_string()]).unwrap();
    }

    let outputs = adapter
        .list_operation_outputs("score", "user-1", "sub-1")
        .await
        .unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].operation_id, "a1");
    assert_eq!(outputs[0].files, vec!["one.csv"]);
    assert_eq!(outputs[1].operation_id, "a2");
    assert_eq!(outputs[1].files, vec!["two.csv"]);
}

#[tokio::test]
async fn test_list_outputs_fails_on_childless_run() {
    let (adapter, backend) = setup();
    backend.add_run(EXPERIMENT, tagged_run("r1", "Completed", "score", "a1"));
    backend
        .add_child("r1", RunRecord::new("r1_child", "Completed"))
        .unwrap();
    backend.add_run(EXPERIMENT, tagged_run("r2", "Queued", "score", "a2"));

    let err = adapter
        .list_operation_outputs("score", "user-1", "sub-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoChildRun { ref run_id } if run_id == "r2"));
}

#[tokio::test]
async fn test_output_of_duplicated_operation_is_ambiguous() {
    let (adapter, backend) = setup();
    for run in ["r1", "r2"] {
        backend.add_run(EXPERIMENT, tagged_run(run, "Completed", "train", "a1"));
        let child = format!("{}_child", run);
        backend
            .add_child(run, RunRecord::new(&child, "Completed"))
            .unwrap();
    }

    let err = adapter
        .get_operation_output("train", "a1", "user-1", "sub-1")
        .await
        .unwrap_err();
    assert!(err.is_ambiguous());
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_single_lookup_stops_after_two_matches() {
    let (adapter, backend) = setup();
    for run in ["r1", "r2", "r3"] {
        backend.add_run(EXPERIMENT, tagged_run(run, "Running", "train", "a1"));
    }

    let err = adapter
        .get_operation_status("train", "a1", "user-1", "sub-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AmbiguousOperation { ref operation_id, count: 2 } if operation_id == "a1"
    ));
}

#[tokio::test]
async fn test_custom_experiment_name() {
    let backend = Arc::new(InMemoryRunBackend::new());
    let settings = ExperimentSettings {
        name: "nightly".into(),
        ..ExperimentSettings::default()
    };
    let adapter = OperationsAdapter::with_backend(backend.clone(), settings);

    let operation_id = adapter.submit_operation(request("train", "user-1")).await.unwrap();
    assert_eq!(backend.submissions()[0].experiment, "nightly");

    let status = adapter
        .get_operation_status("train", operation_id.as_str(), "user-1", "sub-1")
        .await
        .unwrap();
    assert_eq!(status.status, "NotStarted");
}

// ─────────────────────────────────────────────────────────────────────────────
// Mocked workspace
// ─────────────────────────────────────────────────────────────────────────────

const RESOURCE_ID: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws";
const SCOPE: &str =
    "subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws";

fn workspace(server: &MockServer) -> WorkspaceConfig {
    WorkspaceConfig {
        resource_id: RESOURCE_ID.into(),
        tenant_id: "tenant".into(),
        application_id: "app".into(),
        secret_name: "sp-secret".into(),
        region: None,
        api_base_url: Some(server.uri()),
        authority_host: Some(server.uri()),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_secret=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_and_list_over_http() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/history/v1.0/{}/experiments/{}/runs:query",
            SCOPE, EXPERIMENT
        )))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_string_contains("Tags/operationName eq 'train'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "runId": "r1",
                    "status": "Completed",
                    "runType": "azureml.PipelineRun",
                    "tags": { "operationId": "a1", "operationName": "train" }
                },
                {
                    "runId": "r2",
                    "status": "Running",
                    "runType": "azureml.PipelineRun",
                    "tags": { "operationId": "a2", "operationName": "train" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret("sp-secret", "hunter2");
    let adapter = OperationsAdapter::connect(
        &workspace(&server),
        &secrets,
        ExperimentSettings::default(),
        &HttpSection::default(),
    )
    .await
    .unwrap();

    let statuses = adapter.list_operations("train", "user-1", "sub-1").await.unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].operation_id, "a1");
    assert_eq!(statuses[1].status, "Running");
}

#[tokio::test]
async fn test_status_over_http_asks_for_two_runs() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/history/v1.0/{}/experiments/{}/runs:query",
            SCOPE, EXPERIMENT
        )))
        .and(body_partial_json(json!({ "top": 2 })))
        .and(body_string_contains("Tags/operationId eq 'a1'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "runId": "r1", "status": "Running", "tags": { "operationId": "a1" } },
                { "runId": "r2", "status": "Failed", "tags": { "operationId": "a1" } }
            ],
            "continuationToken": "more"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret("sp-secret", "hunter2");
    let adapter = OperationsAdapter::connect(
        &workspace(&server),
        &secrets,
        ExperimentSettings::default(),
        &HttpSection::default(),
    )
    .await
    .unwrap();

    let err = adapter
        .get_operation_status("train", "a1", "user-1", "sub-1")
        .await
        .unwrap_err();
    assert!(err.is_ambiguous());
}

#[tokio::test]
async fn test_connect_rejects_bad_resource_id() {
    let server = MockServer::start().await;
    let mut ws = workspace(&server);
    ws.resource_id = "/subscriptions/sub".into();

    let secrets = StaticSecretStore::new().with_secret("sp-secret", "hunter2");
    let err = OperationsAdapter::connect(
        &ws,
        &secrets,
        ExperimentSettings::default(),
        &HttpSection::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidResourceId { .. }));
}

#[tokio::test]
async fn test_connect_requires_secret() {
    let server = MockServer::start().await;
    let err = OperationsAdapter::connect(
        &workspace(&server),
        &StaticSecretStore::new(),
        ExperimentSettings::default(),
        &HttpSection::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_connect_surfaces_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret("sp-secret", "wrong");
    let err = OperationsAdapter::connect(
        &workspace(&server),
        &secrets,
        ExperimentSettings::default(),
        &HttpSection::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_connect_token_request_honours_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "access_token": "tok-1",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret("sp-secret", "hunter2");
    let http = HttpSection {
        timeout_secs: 1,
        ..HttpSection::default()
    };

    let started = Instant::now();
    let err = OperationsAdapter::connect(
        &workspace(&server),
        &secrets,
        ExperimentSettings::default(),
        &http,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Auth(_)));
    assert!(started.elapsed() < Duration::from_secs(4));
}
