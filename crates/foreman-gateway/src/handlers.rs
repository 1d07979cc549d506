use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use foreman_core::{AgentMessage, MessagePriority, Role};
use foreman_orchestrator::{
    Agent, AgentHealth, ContextEntry, ExecutorSpec, Handoff, MetricsSnapshot, RegisterRequest,
    Task, TaskRequest, WorkflowView,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /agents`.
#[derive(Debug, Deserialize)]
pub struct RegisterAgentBody {
    #[serde(flatten)]
    pub agent: RegisterRequest,
    #[serde(default)]
    pub executor: ExecutorSpec,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub agents: Vec<Agent>,
    pub metrics: MetricsSnapshot,
    pub pending_handoffs: usize,
}

/// Body of `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub from: Role,
    pub to: Role,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: MessagePriority,
}

/// Body of `POST /handoffs`.
#[derive(Debug, Deserialize)]
pub struct HandoffBody {
    pub from: Role,
    pub to: Role,
    #[serde(default)]
    pub deliverables: serde_json::Value,
    /// Falls back to the configured default when absent.
    pub timeout_ms: Option<u64>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "foreman"}))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let orch = &state.orchestrator;
    Json(StatusResponse {
        agents: orch.agents(),
        metrics: orch.get_metrics(),
        pending_handoffs: orch
            .comms()
            .handoffs()
            .list()
            .iter()
            .filter(|h| h.status == foreman_orchestrator::HandoffStatus::Initiated)
            .count(),
    })
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<Agent>> {
    Json(state.orchestrator.agents())
}

pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterAgentBody>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let executor = body.executor.build(&body.agent.name)?;
    let agent = state.orchestrator.register_agent(body.agent, executor)?;
    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn deregister_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.orchestrator.deregister_agent(id)?))
}

pub async fn agent_health(State(state): State<Arc<AppState>>) -> Json<Vec<AgentHealth>> {
    Json(state.orchestrator.health_check().await)
}

/// Submit and run a task, answering once it has finished.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaskRequest>,
) -> ApiResult<Json<Task>> {
    if request.task_type.trim().is_empty() {
        return Err(ApiError::BadRequest("task type must not be empty".into()));
    }
    let task = state.orchestrator.execute(request).await?;
    info!(task_id = %task.id, "Task executed via HTTP");
    Ok(Json(task))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.orchestrator.list_tasks())
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.orchestrator.get_task(id)?))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendMessageBody>,
) -> (StatusCode, Json<AgentMessage>) {
    let message = state
        .orchestrator
        .send_message(body.from, body.to, body.payload, body.priority);
    (StatusCode::CREATED, Json(message))
}

pub async fn messages_for(
    State(state): State<Arc<AppState>>,
    Path(role): Path<String>,
) -> ApiResult<Json<Vec<AgentMessage>>> {
    let role: Role = role.parse()?;
    Ok(Json(state.orchestrator.comms().messages_for(role)))
}

pub async fn initiate_handoff(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HandoffBody>,
) -> (StatusCode, Json<Handoff>) {
    let handoff = state.orchestrator.initiate_handoff(
        body.from,
        body.to,
        body.deliverables,
        body.timeout_ms.map(Duration::from_millis),
    );
    (StatusCode::CREATED, Json(handoff))
}

pub async fn get_handoff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Handoff>> {
    Ok(Json(state.orchestrator.comms().handoff(id)?))
}

pub async fn acknowledge_handoff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Handoff>> {
    Ok(Json(state.orchestrator.acknowledge_handoff(id)?))
}

pub async fn workflow(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<WorkflowView>> {
    Ok(Json(state.orchestrator.workflows().visualization(&project_id)?))
}

pub async fn context(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ContextEntry>> {
    Ok(Json(state.orchestrator.context().get(&project_id)?))
}
