use chrono::{DateTime, Utc};
use foreman_core::{AgentId, MessagePriority, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A set of capability tags. Ordered so that diagnostics are deterministic.
pub type CapabilitySet = BTreeSet<String>;

/// Builds a [`CapabilitySet`] from string slices.
pub fn capability_set<I, S>(caps: I) -> CapabilitySet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    caps.into_iter().map(Into::into).collect()
}

/// Status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Error,
}

/// Snapshot of a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub capabilities: CapabilitySet,
    pub status: AgentStatus,
    pub last_activity: DateTime<Utc>,
    /// Maximum number of concurrent tasks.
    pub capacity: u32,
    /// Number of tasks currently assigned.
    pub workload: u32,
}

impl Agent {
    /// Whether this agent covers every capability in `required`.
    pub fn covers(&self, required: &CapabilitySet) -> bool {
        required.is_subset(&self.capabilities)
    }
}

/// Status of a task in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Assigned,
    Executing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the task has reached `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// What a caller submits. The orchestrator turns it into a [`Task`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Declared type, e.g. `code-generation`.
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub description: String,
    /// Explicit capability requirements; overrides the type table when set.
    #[serde(default)]
    pub required_capabilities: Option<CapabilitySet>,
    #[serde(default)]
    pub priority: MessagePriority,
    /// Project whose context store entry and workflow this task belongs to.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Free-form input handed to the executor.
    #[serde(default)]
    pub input: serde_json::Value,
}

impl TaskRequest {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = Some(capability_set(caps));
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }
}

/// A task owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    pub required_capabilities: Option<CapabilitySet>,
    pub priority: MessagePriority,
    pub project_id: Option<String>,
    pub input: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Agent the task was routed to, once assigned.
    pub assigned_to: Option<AgentId>,
    /// Project context copied in from the context store at dispatch.
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: Option<f64>,
}

impl Task {
    /// Creates a queued task from a request.
    pub fn from_request(request: TaskRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: request.task_type,
            description: request.description,
            required_capabilities: request.required_capabilities,
            priority: request.priority,
            project_id: request.project_id,
            input: request.input,
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            completed_at: None,
            assigned_to: None,
            context: None,
            result: None,
            error: None,
            duration_ms: None,
        }
    }

    /// Key under which the task's workflow and context are tracked.
    pub fn project_key(&self) -> String {
        self.project_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}
