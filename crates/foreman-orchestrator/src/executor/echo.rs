use super::AgentExecutor;
use crate::types::Task;
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use std::time::Duration;

/// Answers every task with a summary of what it was asked to do.
///
/// Used for local runs and tests. An optional delay simulates slow work, and
/// `failing` makes every execution return an error.
#[derive(Debug, Clone, Default)]
pub struct EchoExecutor {
    name: String,
    delay: Option<Duration>,
    failing: bool,
}

impl EchoExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl AgentExecutor for EchoExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, task: &Task) -> ForemanResult<serde_json::Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(ForemanError::AgentExecution(format!(
                "{} refused task {}",
                self.name, task.id
            )));
        }
        Ok(serde_json::json!({
            "executor": self.name,
            "task_id": task.id,
            "type": task.task_type,
            "description": task.description,
            "input": task.input,
            "context": task.context,
        }))
    }
}
