//! Integration tests for shellmatch-engine API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

use helpers::*;
use shellmatch_common::EventBus;
use shellmatch_engine::assessment::DisabledAssessment;
use shellmatch_engine::directory::InMemoryDirectory;
use shellmatch_engine::orchestrator::MatchOrchestrator;
use shellmatch_engine::AppState;

/// Test helper: app over a small in-memory directory
fn create_test_app() -> axum::Router {
    let directory = InMemoryDirectory::new(
        vec![
            customer(1, "Acme Corp", Some("acme.com")),
            customer(2, "Zyzzx Unmatched Co", None),
        ],
        vec![
            shell(101, "Acme Corporation", Some("www.acme.com")),
            shell(102, "Globex", Some("globex.com")),
        ],
    );
    let event_bus = EventBus::new(100);
    let orchestrator = MatchOrchestrator::new(Arc::new(directory), Arc::new(DisabledAssessment), event_bus.clone());
    let state = AppState::new(orchestrator, event_bus, test_config());

    shellmatch_engine::build_router(state)
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = send(create_test_app(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "shellmatch-engine");
    assert_eq!(json["running_jobs"], 0);
    assert_eq!(json["assessment"], "disabled");
}

#[tokio::test]
async fn test_batch_endpoint_returns_full_result_set() {
    let body = json!({
        "customerIds": [account_id(1), account_id(2), "bogus"],
        "shellIds": [account_id(101), account_id(102)],
    });
    let (status, json) = send(create_test_app(), post_json("/match/batch", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"].as_array().unwrap().len(), 3);
    assert_eq!(json["results"][0]["status"], "MATCHED");
    assert_eq!(json["results"][0]["recommendedShellId"], account_id(101));
    assert_eq!(json["results"][1]["status"], "UNMATCHED");
    assert_eq!(json["results"][2]["status"], "INVALID");

    let summary = &json["summary"];
    assert_eq!(summary["totalCustomerAccounts"], 3);
    assert_eq!(summary["matchedPairs"], 1);
    assert_eq!(summary["unmatchedCustomers"], 1);
    assert_eq!(summary["invalidCustomerAccounts"], 1);
    assert_eq!(summary["totalShellAccounts"], 2);
    assert!(summary["executionTime"].as_str().unwrap().ends_with('s'));
    assert_eq!(json["invalidCustomers"], json!(["bogus"]));
    assert_eq!(json["cancelled"], false);
}

#[tokio::test]
async fn test_batch_rejects_empty_lists() {
    let body = json!({ "customerIds": [], "shellIds": [account_id(101)] });
    let (status, json) = send(create_test_app(), post_json("/match/batch", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");

    let body = json!({ "customerIds": [account_id(1)], "shellIds": [] });
    let (status, _) = send(create_test_app(), post_json("/match/batch", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_rejects_invalid_config_override() {
    let body = json!({
        "customerIds": [account_id(1)],
        "shellIds": [account_id(101)],
        "config": { "aiConcurrency": 0 },
    });
    let (status, json) = send(create_test_app(), post_json("/match/batch", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("ai_concurrency"));
}

#[tokio::test]
async fn test_job_endpoints_for_unknown_job() {
    let app = create_test_app();
    let job_id = uuid::Uuid::new_v4();

    let (status, json) = send(app.clone(), get("/match/jobs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let (status, json) = send(app.clone(), get(&format!("/match/jobs/{}", job_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, _) = send(app, post_json(&format!("/match/jobs/{}/cancel", job_id), &json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_endpoint_builds_two_sheets() {
    let app = create_test_app();
    let body = json!({
        "customerIds": [account_id(1), account_id(2)],
        "shellIds": [account_id(101), account_id(102)],
    });
    let (status, batch) = send(app.clone(), post_json("/match/batch", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = send(app, post_json("/match/export", &batch)).await;
    assert_eq!(status, StatusCode::OK);

    let sheets = report["sheets"].as_array().unwrap();
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0]["name"], "Matching Results");
    assert_eq!(sheets[0]["headers"][0], "Customer ID");
    assert_eq!(sheets[0]["rows"].as_array().unwrap().len(), 2);
    assert_eq!(sheets[0]["rows"][0][3], "MATCHED");
    assert_eq!(sheets[1]["name"], "Summary");
}
