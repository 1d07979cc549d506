use crate::handoff::Handoff;
use crate::types::{Agent, Task};
use crate::workflow::Phase;
use foreman_core::{AgentMessage, Role};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

/// Lifecycle notifications published by the orchestrator.
///
/// Payloads are snapshots of the entity at the moment of the transition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OrchestratorEvent {
    #[serde(rename = "task:submitted")]
    TaskSubmitted(Task),
    #[serde(rename = "task:completed")]
    TaskCompleted(Task),
    #[serde(rename = "task:failed")]
    TaskFailed(Task),
    #[serde(rename = "agent:registered")]
    AgentRegistered(Agent),
    #[serde(rename = "agent:deregistered")]
    AgentDeregistered(Agent),
    #[serde(rename = "message:sent")]
    MessageSent(AgentMessage),
    #[serde(rename = "handoff:initiated")]
    HandoffInitiated(Handoff),
    #[serde(rename = "handoff:completed")]
    HandoffCompleted(Handoff),
    #[serde(rename = "handoff:timeout")]
    HandoffTimeout(Handoff),
    #[serde(rename = "workflow:started")]
    WorkflowStarted { project_id: String, task_id: Uuid },
    #[serde(rename = "workflow:phase_completed")]
    PhaseCompleted {
        project_id: String,
        phase: Phase,
        role: Role,
    },
}

impl OrchestratorEvent {
    /// The wire name of the event, e.g. `handoff:timeout`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskSubmitted(_) => "task:submitted",
            Self::TaskCompleted(_) => "task:completed",
            Self::TaskFailed(_) => "task:failed",
            Self::AgentRegistered(_) => "agent:registered",
            Self::AgentDeregistered(_) => "agent:deregistered",
            Self::MessageSent(_) => "message:sent",
            Self::HandoffInitiated(_) => "handoff:initiated",
            Self::HandoffCompleted(_) => "handoff:completed",
            Self::HandoffTimeout(_) => "handoff:timeout",
            Self::WorkflowStarted { .. } => "workflow:started",
            Self::PhaseCompleted { .. } => "workflow:phase_completed",
        }
    }
}

/// Fan-out of [`OrchestratorEvent`]s to subscribers.
///
/// Every subscriber gets its own unbounded channel, so an event reaches each
/// subscriber that existed when it was published regardless of how slowly
/// the subscriber drains. Late subscribers see only later events.
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OrchestratorEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OrchestratorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, dropping closed ones.
    pub fn publish(&self, event: OrchestratorEvent) {
        let mut subscribers = self.subscribers.lock();
        trace!(event = event.name(), subscribers = subscribers.len(), "Publishing event");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
