//! Pluggable task executors.
//!
//! The orchestrator never does work itself: every registered agent is backed
//! by an [`AgentExecutor`] that turns a [`Task`] into a JSON result.

mod echo;
mod webhook;

pub use echo::EchoExecutor;
pub use webhook::WebhookExecutor;

use crate::types::{CapabilitySet, Task};
use async_trait::async_trait;
use foreman_core::ForemanResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Executes tasks on behalf of one agent.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Capabilities this executor advertises, overriding the role defaults
    /// when the agent is registered without an explicit set.
    fn capabilities(&self) -> Option<CapabilitySet> {
        None
    }

    /// Run the task. The task's `context` holds the project's remembered
    /// context when there is any.
    async fn execute(&self, task: &Task) -> ForemanResult<serde_json::Value>;

    /// Liveness probe used by health checks.
    async fn health(&self) -> bool {
        true
    }
}

/// Declarative description of an executor, as found in config files and
/// registration requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutorSpec {
    /// [`EchoExecutor`].
    #[default]
    Echo,
    /// [`WebhookExecutor`] posting to `url`.
    Webhook {
        url: String,
        #[serde(default = "default_webhook_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

impl ExecutorSpec {
    /// Instantiate the executor for an agent called `name`.
    pub fn build(&self, name: &str) -> ForemanResult<Arc<dyn AgentExecutor>> {
        Ok(match self {
            ExecutorSpec::Echo => Arc::new(EchoExecutor::new(name)),
            ExecutorSpec::Webhook { url, timeout_secs } => Arc::new(WebhookExecutor::new(
                name,
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?),
        })
    }
}
