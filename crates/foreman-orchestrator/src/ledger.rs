use crate::types::{Task, TaskStatus};
use chrono::Utc;
use foreman_core::{AgentId, ForemanError, ForemanResult};
use std::collections::HashMap;
use uuid::Uuid;

/// Book of every task the orchestrator has accepted.
///
/// Enforces the `queued -> assigned -> executing -> {completed, failed}`
/// lifecycle; any non-terminal task may fail.
pub struct TaskLedger {
    tasks: HashMap<Uuid, Task>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Add a task to the ledger.
    pub fn add(&mut self, task: Task) -> Uuid {
        let id = task.id;
        self.tasks.insert(id, task);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    fn transition(
        &mut self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> ForemanResult<&mut Task> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| ForemanError::not_found("task", id))?;
        if task.status != from {
            return Err(ForemanError::InvalidState(format!(
                "task {id} is {:?}, expected {from:?} before moving to {to:?}",
                task.status
            )));
        }
        task.status = to;
        Ok(task)
    }

    /// Mark a queued task as assigned to `agent_id`.
    pub fn mark_assigned(&mut self, id: Uuid, agent_id: AgentId) -> ForemanResult<Task> {
        let task = self.transition(id, TaskStatus::Queued, TaskStatus::Assigned)?;
        task.assigned_to = Some(agent_id);
        Ok(task.clone())
    }

    /// Mark an assigned task as executing, attaching the project context.
    pub fn mark_executing(
        &mut self,
        id: Uuid,
        context: Option<serde_json::Value>,
    ) -> ForemanResult<Task> {
        let task = self.transition(id, TaskStatus::Assigned, TaskStatus::Executing)?;
        task.context = context;
        Ok(task.clone())
    }

    /// Mark an executing task as completed.
    pub fn mark_completed(
        &mut self,
        id: Uuid,
        result: serde_json::Value,
        duration_ms: f64,
    ) -> ForemanResult<Task> {
        let task = self.transition(id, TaskStatus::Executing, TaskStatus::Completed)?;
        task.result = Some(result);
        task.duration_ms = Some(duration_ms);
        task.completed_at = Some(Utc::now());
        Ok(task.clone())
    }

    /// Mark a non-terminal task as failed.
    pub fn mark_failed(&mut self, id: Uuid, reason: String) -> ForemanResult<Task> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| ForemanError::not_found("task", id))?;
        if task.status.is_terminal() {
            return Err(ForemanError::InvalidState(format!(
                "task {id} already finished as {:?}",
                task.status
            )));
        }
        task.status = TaskStatus::Failed;
        task.error = Some(reason);
        task.completed_at = Some(Utc::now());
        Ok(task.clone())
    }

    /// All tasks in creation order.
    pub fn all_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

impl Default for TaskLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::TaskRequest;

    fn queued(ledger: &mut TaskLedger) -> Uuid {
        ledger.add(Task::from_request(TaskRequest::new("code-generation")))
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = TaskLedger::new();
        assert!(ledger.all_tasks().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let mut ledger = TaskLedger::new();
        let id = queued(&mut ledger);
        let agent = Uuid::new_v4();

        let t = ledger.mark_assigned(id, agent).unwrap();
        assert_eq!(t.status, TaskStatus::Assigned);
        assert_eq!(t.assigned_to, Some(agent));

        let t = ledger
            .mark_executing(id, Some(serde_json::json!({"prior": 1})))
            .unwrap();
        assert_eq!(t.status, TaskStatus::Executing);
        assert_eq!(t.context.unwrap()["prior"], 1);

        let t = ledger
            .mark_completed(id, serde_json::json!("done"), 12.5)
            .unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.duration_ms, Some(12.5));
        assert!(t.completed_at.is_some());
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut ledger = TaskLedger::new();
        let id = queued(&mut ledger);
        assert!(matches!(
            ledger.mark_executing(id, None),
            Err(ForemanError::InvalidState(_))
        ));
        assert!(matches!(
            ledger.mark_completed(id, serde_json::Value::Null, 1.0),
            Err(ForemanError::InvalidState(_))
        ));
        assert_eq!(ledger.get(id).unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn test_fail_from_queued() {
        let mut ledger = TaskLedger::new();
        let id = queued(&mut ledger);
        let t = ledger.mark_failed(id, "no agent".into()).unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.error.as_deref(), Some("no agent"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut ledger = TaskLedger::new();
        let id = queued(&mut ledger);
        ledger.mark_failed(id, "boom".into()).unwrap();
        assert!(ledger.mark_failed(id, "again".into()).is_err());
        assert!(ledger.mark_assigned(id, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_unknown_task() {
        let mut ledger = TaskLedger::new();
        assert!(matches!(
            ledger.mark_assigned(Uuid::new_v4(), Uuid::new_v4()),
            Err(ForemanError::NotFound { kind: "task", .. })
        ));
    }

    #[test]
    fn test_all_tasks_oldest_first() {
        let mut ledger = TaskLedger::new();
        let a = queued(&mut ledger);
        let b = queued(&mut ledger);
        ledger.mark_failed(a, "x".into()).unwrap();
        let tasks = ledger.all_tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].created_at <= tasks[1].created_at);
        assert_eq!(ledger.get(a).unwrap().status, TaskStatus::Failed);
        assert_eq!(ledger.get(b).unwrap().status, TaskStatus::Queued);
    }
}
