#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use foreman_gateway::GatewayServer;
use foreman_orchestrator::{Orchestrator, OrchestratorConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, Arc<Orchestrator>) {
    let orch = Arc::new(Orchestrator::new(OrchestratorConfig::default()).unwrap());
    (GatewayServer::build(Arc::clone(&orch)), orch)
}

/// Send one request and decode the JSON body (Null when empty).
async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "foreman");
}

#[tokio::test]
async fn test_register_execute_and_status() {
    let (app, _) = app();

    let (status, agent) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({"role": "backend_developer", "name": "be-1", "capacity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(agent["status"], "idle");
    let agent_id = agent["id"].as_str().unwrap().to_string();

    let (status, task) = send(
        &app,
        "POST",
        "/execute",
        Some(json!({"type": "code-generation", "description": "add login endpoint"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "completed");
    assert_eq!(task["assigned_to"], agent_id.as_str());

    let task_id = task["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], task["id"]);

    let (status, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents"].as_array().unwrap().len(), 1);
    assert_eq!(body["metrics"]["totalTasks"], 1);
    assert_eq!(body["metrics"]["completedTasks"], 1);
    assert_eq!(body["metrics"]["activeAgentCount"], 1);
}

#[tokio::test]
async fn test_execute_without_agent_is_unprocessable() {
    let (app, _) = app();
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"type": "deployment"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "NoSuitableAgent");
    assert!(body["message"].as_str().unwrap().contains("deploy"));
}

#[tokio::test]
async fn test_execute_rejects_empty_type() {
    let (app, _) = app();
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"type": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadRequest");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let (app, _) = app();
    let body = json!({
        "role": "qa_engineer",
        "name": "qa",
        "id": "6f1c1d3e-2b9f-4c1e-9a55-1d2b3c4d5e6f"
    });
    let (status, _) = send(&app, "POST", "/agents", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = send(&app, "POST", "/agents", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "DuplicateRegistration");
}

#[tokio::test]
async fn test_deregister_agent() {
    let (app, orch) = app();
    let (_, agent) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({"role": "data_analyst", "name": "da", "executor": {"kind": "echo"}})),
    )
    .await;
    let id = agent["id"].as_str().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/agents/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(orch.agents().is_empty());

    let (status, _) = send(&app, "DELETE", &format!("/agents/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_webhook_executor_is_bad_request() {
    let (app, _) = app();
    let (status, _) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({
            "role": "devops_engineer",
            "name": "ops",
            "executor": {"kind": "webhook", "url": "not a url"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_messages_round_trip() {
    let (app, _) = app();
    let (status, msg) = send(
        &app,
        "POST",
        "/messages",
        Some(json!({
            "from": "product_manager",
            "to": "ux_designer",
            "payload": {"brief": "checkout redesign"},
            "priority": "high"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(msg["priority"], "high");

    let (status, inbox) = send(&app, "GET", "/messages/ux_designer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["payload"]["brief"], "checkout redesign");

    let (status, _) = send(&app, "GET", "/messages/astronaut", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_handoff_lifecycle() {
    let (app, _) = app();
    let (status, handoff) = send(
        &app,
        "POST",
        "/handoffs",
        Some(json!({
            "from": "backend_developer",
            "to": "qa_engineer",
            "deliverables": {"build": "1.4.0"},
            "timeout_ms": 60000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(handoff["status"], "initiated");
    let id = handoff["id"].as_str().unwrap();

    let (_, status_body) = send(&app, "GET", "/status", None).await;
    assert_eq!(status_body["pending_handoffs"], 1);

    let (status, acked) = send(&app, "POST", &format!("/handoffs/{id}/ack"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(acked["status"], "completed");

    let (status, fetched) = send(&app, "GET", &format!("/handoffs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "completed");
}

#[tokio::test]
async fn test_timed_out_handoff_cannot_be_acknowledged() {
    let (app, _) = app();
    let (_, handoff) = send(
        &app,
        "POST",
        "/handoffs",
        Some(json!({"from": "ux_designer", "to": "frontend_developer", "timeout_ms": 20})),
    )
    .await;
    let id = handoff["id"].as_str().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;

    let (status, body) = send(&app, "POST", &format!("/handoffs/{id}/ack"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidState");
}

#[tokio::test]
async fn test_workflow_and_context_endpoints() {
    let (app, _) = app();
    send(
        &app,
        "POST",
        "/agents",
        Some(json!({"role": "product_manager", "name": "pm"})),
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        "/execute",
        Some(json!({
            "type": "planning",
            "description": "plan the MVP for a booking platform",
            "project_id": "booking"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = send(&app, "GET", "/workflows/booking", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phases"][0]["phase"], "discovery");
    assert_eq!(view["phases"][0]["completed"], true);
    assert_eq!(view["phases"][1]["completed"], false);

    let (status, ctx) = send(&app, "GET", "/context/booking", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx["source"], "product_manager");

    let (status, _) = send(&app, "GET", "/workflows/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/context/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agent_health_endpoint() {
    let (app, _) = app();
    send(
        &app,
        "POST",
        "/agents",
        Some(json!({"role": "support_engineer", "name": "helpdesk"})),
    )
    .await;
    let (status, report) = send(&app, "GET", "/agents/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report[0]["healthy"], true);
    assert_eq!(report[0]["status"], "idle");
}
