use crate::catalog::CapabilityCatalog;
use crate::comms::CommunicationLayer;
use crate::config::OrchestratorConfig;
use crate::context::ContextStore;
use crate::events::{EventBus, OrchestratorEvent};
use crate::executor::AgentExecutor;
use crate::handoff::Handoff;
use crate::ledger::TaskLedger;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::registry::{AgentRegistry, RegisterRequest};
use crate::router::TaskRouter;
use crate::types::{Agent, AgentStatus, Task, TaskRequest, TaskStatus};
use crate::workflow::{WorkflowClassifier, WorkflowTracker};
use foreman_core::{AgentId, AgentMessage, ForemanError, ForemanResult, MessagePriority, Role};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of probing one agent's executor.
#[derive(Debug, Clone, Serialize)]
pub struct AgentHealth {
    pub agent_id: AgentId,
    pub name: String,
    pub role: Role,
    pub healthy: bool,
    /// Status after the probe was applied.
    pub status: AgentStatus,
}

/// What [`Orchestrator::shutdown`] tore down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub agents_removed: usize,
    pub handoffs_cancelled: usize,
}

/// The orchestration engine.
///
/// Owns the registry, the task ledger, metrics, messaging, workflows and the
/// context store, and drives each task through
/// `queued -> assigned -> executing -> {completed, failed}`. No lock is held
/// while an agent executes.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<AgentRegistry>,
    router: TaskRouter,
    ledger: RwLock<TaskLedger>,
    metrics: MetricsCollector,
    events: Arc<EventBus>,
    comms: CommunicationLayer,
    workflows: WorkflowTracker,
    context: ContextStore,
    executors: RwLock<HashMap<AgentId, Arc<dyn AgentExecutor>>>,
}

impl Orchestrator {
    /// Create an orchestrator with the default capability catalog.
    pub fn new(config: OrchestratorConfig) -> ForemanResult<Self> {
        Self::with_catalog(config, CapabilityCatalog::default())
    }

    /// Create with a custom capability catalog.
    pub fn with_catalog(
        config: OrchestratorConfig,
        catalog: CapabilityCatalog,
    ) -> ForemanResult<Self> {
        let classifier = WorkflowClassifier::new(&config.workflow_keywords)?;
        let events = Arc::new(EventBus::new());
        Ok(Self {
            router: TaskRouter::new(config.routing),
            registry: Arc::new(AgentRegistry::new(Arc::new(catalog))),
            ledger: RwLock::new(TaskLedger::new()),
            metrics: MetricsCollector::new(),
            comms: CommunicationLayer::new(Arc::clone(&events)),
            events,
            workflows: WorkflowTracker::new(classifier),
            context: ContextStore::new(),
            executors: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    pub fn comms(&self) -> &CommunicationLayer {
        &self.comms
    }

    pub fn workflows(&self) -> &WorkflowTracker {
        &self.workflows
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Subscribe to lifecycle events published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    // --- agents -----------------------------------------------------------

    /// Register an agent backed by `executor`.
    ///
    /// Without explicit capabilities the executor's advertised set is used,
    /// falling back to the role defaults from the catalog.
    pub fn register_agent(
        &self,
        mut request: RegisterRequest,
        executor: Arc<dyn AgentExecutor>,
    ) -> ForemanResult<Agent> {
        if request.capabilities.is_none() {
            request.capabilities = executor.capabilities();
        }
        let agent = self.registry.register(request)?;
        self.executors.write().insert(agent.id, executor);
        self.events
            .publish(OrchestratorEvent::AgentRegistered(agent.clone()));
        Ok(agent)
    }

    /// Remove an idle agent and its executor.
    pub fn deregister_agent(&self, id: AgentId) -> ForemanResult<Agent> {
        let agent = self.registry.deregister(id)?;
        self.executors.write().remove(&id);
        self.events
            .publish(OrchestratorEvent::AgentDeregistered(agent.clone()));
        Ok(agent)
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.registry.list()
    }

    /// Probe every agent's executor.
    ///
    /// Unhealthy idle agents are moved to `error`; agents in `error` that
    /// answer healthy and hold no work go back to `idle`.
    pub async fn health_check(&self) -> Vec<AgentHealth> {
        let probes: Vec<(Agent, Option<Arc<dyn AgentExecutor>>)> = {
            let executors = self.executors.read();
            self.registry
                .list()
                .into_iter()
                .map(|a| {
                    let exec = executors.get(&a.id).cloned();
                    (a, exec)
                })
                .collect()
        };

        let mut report = Vec::with_capacity(probes.len());
        for (agent, executor) in probes {
            let healthy = match executor {
                Some(exec) => exec.health().await,
                None => false,
            };
            // The snapshot may be stale after the probe; transitions are
            // re-checked against the live status.
            let (expected, next) = if healthy {
                (AgentStatus::Error, AgentStatus::Idle)
            } else {
                (AgentStatus::Idle, AgentStatus::Error)
            };
            let status = match self.registry.set_status_if(agent.id, expected, next) {
                Ok(Some(updated)) => {
                    info!(agent_id = %agent.id, status = ?updated.status, "Agent health changed");
                    updated.status
                }
                Ok(None) => self
                    .registry
                    .get(agent.id)
                    .map_or(agent.status, |current| current.status),
                Err(e) => {
                    warn!(agent_id = %agent.id, error = %e, "Could not apply health status");
                    agent.status
                }
            };
            report.push(AgentHealth {
                agent_id: agent.id,
                name: agent.name,
                role: agent.role,
                healthy,
                status,
            });
        }
        report
    }

    // --- tasks ------------------------------------------------------------

    /// Accept a task into the ledger as `queued`.
    ///
    /// Product-development tasks start a workflow for their project.
    pub fn submit(&self, request: TaskRequest) -> Task {
        let task = Task::from_request(request);
        self.ledger.write().add(task.clone());
        self.metrics.record_submitted();
        info!(task_id = %task.id, task_type = %task.task_type, "Task submitted");
        self.events
            .publish(OrchestratorEvent::TaskSubmitted(task.clone()));

        if self.workflows.classify(&task) {
            let project_id = task.project_key();
            let (_, created) = self.workflows.ensure_workflow(&project_id, task.id);
            if created {
                self.events.publish(OrchestratorEvent::WorkflowStarted {
                    project_id,
                    task_id: task.id,
                });
            }
        }
        task
    }

    /// Route a queued task, run it on the chosen agent and return the
    /// finished task.
    ///
    /// Routing and capacity failures fail the task immediately; it is never
    /// re-queued. Execution errors fail the task and come back as
    /// [`ForemanError::AgentExecution`].
    pub async fn dispatch(&self, task_id: Uuid) -> ForemanResult<Task> {
        let task = self.get_task(task_id)?;
        if task.status != TaskStatus::Queued {
            return Err(ForemanError::InvalidState(format!(
                "task {task_id} is {:?}, only queued tasks can be dispatched",
                task.status
            )));
        }

        let decision = match self.router.route(&task, &self.registry) {
            Ok(decision) => decision,
            Err(e) => return Err(self.fail_task(task_id, None, e)),
        };
        let agent = decision.agent;

        if let Err(e) = self.registry.mark_busy(agent.id) {
            return Err(self.fail_task(task_id, None, e));
        }
        let assigned = self.ledger.write().mark_assigned(task_id, agent.id);
        if let Err(e) = assigned {
            self.release(agent.id);
            return Err(e);
        }

        let executor = self.executors.read().get(&agent.id).cloned();
        let Some(executor) = executor else {
            self.release(agent.id);
            return Err(self.fail_task(
                task_id,
                Some(agent.role),
                ForemanError::not_found("executor", agent.id),
            ));
        };

        let context = task
            .project_id
            .as_deref()
            .and_then(|p| self.context.get(p).ok())
            .map(|entry| entry.payload);
        let executing = self.ledger.write().mark_executing(task_id, context);
        let running = match executing {
            Ok(task) => task,
            Err(e) => {
                self.release(agent.id);
                return Err(self.fail_task(task_id, Some(agent.role), e));
            }
        };

        let started = Instant::now();
        let outcome = self.run_executor(executor.as_ref(), &running).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.release(agent.id);

        match outcome {
            Ok(result) => {
                if let Err(e) = self.registry.touch(agent.id) {
                    warn!(agent_id = %agent.id, error = %e, "Could not touch agent");
                }
                self.complete_task(task_id, &agent, result, duration_ms)
            }
            Err(e) => {
                let e = match e {
                    ForemanError::AgentExecution(_) => e,
                    other => ForemanError::AgentExecution(other.to_string()),
                };
                Err(self.fail_task(task_id, Some(agent.role), e))
            }
        }
    }

    /// Dispatch on a spawned task so the caller is not blocked.
    pub fn dispatch_detached(self: &Arc<Self>, task_id: Uuid) -> JoinHandle<ForemanResult<Task>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.dispatch(task_id).await })
    }

    /// Submit and dispatch in one call.
    pub async fn execute(&self, request: TaskRequest) -> ForemanResult<Task> {
        let task = self.submit(request);
        self.dispatch(task.id).await
    }

    pub fn get_task(&self, id: Uuid) -> ForemanResult<Task> {
        self.ledger
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ForemanError::not_found("task", id))
    }

    /// Every task, oldest first.
    pub fn list_tasks(&self) -> Vec<Task> {
        self.ledger.read().all_tasks().into_iter().cloned().collect()
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        let active = self
            .registry
            .list()
            .iter()
            .filter(|a| a.status != AgentStatus::Error)
            .count();
        self.metrics.snapshot(active)
    }

    async fn run_executor(
        &self,
        executor: &dyn AgentExecutor,
        task: &Task,
    ) -> ForemanResult<serde_json::Value> {
        match self.config.execution_timeout() {
            Some(limit) => tokio::time::timeout(limit, executor.execute(task))
                .await
                .unwrap_or_else(|_| {
                    Err(ForemanError::AgentExecution(format!(
                        "execution timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
            None => executor.execute(task).await,
        }
    }

    fn release(&self, agent_id: AgentId) {
        if let Err(e) = self.registry.mark_free(agent_id) {
            warn!(agent_id = %agent_id, error = %e, "Could not free agent");
        }
    }

    fn complete_task(
        &self,
        task_id: Uuid,
        agent: &Agent,
        result: serde_json::Value,
        duration_ms: f64,
    ) -> ForemanResult<Task> {
        let task = self
            .ledger
            .write()
            .mark_completed(task_id, result.clone(), duration_ms)?;
        self.metrics.record_completed(agent.role, duration_ms);

        if let Some(project_id) = &task.project_id {
            self.context
                .put(project_id.clone(), result.clone(), agent.role.as_str());
        }
        self.record_workflow(&task, agent.role, Some(result));

        info!(
            task_id = %task_id,
            agent_id = %agent.id,
            duration_ms,
            "Task completed"
        );
        self.events
            .publish(OrchestratorEvent::TaskCompleted(task.clone()));
        Ok(task)
    }

    /// Move the task to `failed` and hand the error back for the caller to
    /// return.
    fn fail_task(&self, task_id: Uuid, role: Option<Role>, err: ForemanError) -> ForemanError {
        let failed = self.ledger.write().mark_failed(task_id, err.to_string());
        match failed {
            Ok(task) => {
                self.metrics.record_failed(role);
                if let Some(role) = role {
                    self.record_workflow(&task, role, None);
                }
                warn!(task_id = %task_id, error = %err, "Task failed");
                self.events.publish(OrchestratorEvent::TaskFailed(task));
            }
            Err(e) => error!(task_id = %task_id, error = %e, "Could not record task failure"),
        }
        err
    }

    /// Record a contribution to the task's workflow, if it has one.
    fn record_workflow(&self, task: &Task, role: Role, result: Option<serde_json::Value>) {
        let project_id = task.project_key();
        let Ok(update) = self
            .workflows
            .record_contribution(&project_id, role, result.is_some())
        else {
            return;
        };
        if let Some(result) = result {
            let entry = serde_json::json!({
                "task_id": task.id,
                "role": role,
                "result": result,
            });
            if let Err(e) = self.workflows.record_result(&project_id, entry) {
                warn!(project_id = %project_id, error = %e, "Could not record workflow result");
            }
        }
        if update.newly_completed {
            self.events.publish(OrchestratorEvent::PhaseCompleted {
                project_id,
                phase: update.phase,
                role,
            });
        }
    }

    // --- communication ------------------------------------------------------

    pub fn send_message(
        &self,
        from: Role,
        to: Role,
        payload: serde_json::Value,
        priority: MessagePriority,
    ) -> AgentMessage {
        self.comms.send_message(from, to, payload, priority)
    }

    /// Start a handoff; `timeout` defaults to the configured handoff timeout.
    pub fn initiate_handoff(
        &self,
        from: Role,
        to: Role,
        deliverables: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Handoff {
        let timeout = timeout.unwrap_or_else(|| self.config.default_handoff_timeout());
        self.comms.initiate_handoff(from, to, deliverables, timeout)
    }

    pub fn acknowledge_handoff(&self, id: Uuid) -> ForemanResult<Handoff> {
        self.comms.acknowledge_handoff(id)
    }

    /// Drop every agent and cancel pending handoff timers without firing
    /// timeout events.
    pub fn shutdown(&self) -> ShutdownReport {
        let handoffs_cancelled = self.comms.shutdown();
        let agents_removed = self.registry.clear();
        self.executors.write().clear();
        info!(agents_removed, handoffs_cancelled, "Orchestrator shut down");
        ShutdownReport {
            agents_removed,
            handoffs_cancelled,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::executor::EchoExecutor;
    use crate::types::capability_set;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(OrchestratorConfig::default()).unwrap()
    }

    fn echo(name: &str) -> Arc<dyn AgentExecutor> {
        Arc::new(EchoExecutor::new(name))
    }

    struct Flaky {
        healthy: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl AgentExecutor for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn capabilities(&self) -> Option<crate::types::CapabilitySet> {
            Some(capability_set(["test", "chaos"]))
        }

        async fn execute(&self, _task: &Task) -> ForemanResult<serde_json::Value> {
            Err(ForemanError::Http("connection reset".into()))
        }

        async fn health(&self) -> bool {
            self.healthy.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_execute_completes_and_frees_agent() {
        let orch = orchestrator();
        let agent = orch
            .register_agent(RegisterRequest::new(Role::BackendDeveloper, "be"), echo("be"))
            .unwrap();

        let task = orch.execute(TaskRequest::new("code-generation")).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.assigned_to, Some(agent.id));
        assert!(task.duration_ms.is_some());
        assert_eq!(task.result.as_ref().unwrap()["executor"], "be");

        let agent = orch.registry().get(agent.id).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.workload, 0);

        let m = orch.get_metrics();
        assert_eq!(m.total_tasks, 1);
        assert_eq!(m.completed_tasks, 1);
        assert_eq!(m.active_agent_count, 1);
    }

    #[tokio::test]
    async fn test_no_suitable_agent_fails_task() {
        let orch = orchestrator();
        let err = orch.execute(TaskRequest::new("deployment")).await.unwrap_err();
        assert!(matches!(err, ForemanError::NoSuitableAgent { .. }));

        let tasks = orch.list_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(orch.get_metrics().failed_tasks, 1);
    }

    #[tokio::test]
    async fn test_executor_error_is_wrapped_and_agent_freed() {
        let orch = orchestrator();
        let agent = orch
            .register_agent(
                RegisterRequest::new(Role::QaEngineer, "flaky"),
                Arc::new(Flaky {
                    healthy: true.into(),
                }),
            )
            .unwrap();
        assert!(agent.capabilities.contains("chaos"));

        let err = orch.execute(TaskRequest::new("testing")).await.unwrap_err();
        assert!(matches!(err, ForemanError::AgentExecution(_)));
        assert_eq!(orch.registry().get(agent.id).unwrap().workload, 0);
        assert_eq!(orch.get_metrics().failed_tasks, 1);
    }

    #[tokio::test]
    async fn test_execution_timeout_fails_task() {
        let config = OrchestratorConfig {
            execution_timeout_ms: Some(20),
            ..Default::default()
        };
        let orch = Orchestrator::new(config).unwrap();
        let agent = orch
            .register_agent(
                RegisterRequest::new(Role::SupportEngineer, "slow"),
                Arc::new(EchoExecutor::new("slow").with_delay(Duration::from_secs(5))),
            )
            .unwrap();

        let err = orch.execute(TaskRequest::new("support")).await.unwrap_err();
        match err {
            ForemanError::AgentExecution(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(orch.registry().get(agent.id).unwrap().status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_dispatch_requires_queued_task() {
        let orch = orchestrator();
        orch.register_agent(RegisterRequest::new(Role::QaEngineer, "qa"), echo("qa"))
            .unwrap();
        let task = orch.execute(TaskRequest::new("testing")).await.unwrap();
        assert!(matches!(
            orch.dispatch(task.id).await,
            Err(ForemanError::InvalidState(_))
        ));
        assert!(matches!(
            orch.dispatch(Uuid::new_v4()).await,
            Err(ForemanError::NotFound { kind: "task", .. })
        ));
    }

    #[tokio::test]
    async fn test_context_flows_into_next_task() {
        let orch = orchestrator();
        orch.register_agent(
            RegisterRequest::new(Role::MarketResearcher, "mr"),
            echo("mr"),
        )
        .unwrap();

        let first = orch
            .execute(TaskRequest::new("research").with_project("acme"))
            .await
            .unwrap();
        assert!(first.context.is_none());
        let stored = orch.context().get("acme").unwrap();
        assert_eq!(stored.source, "market_researcher");

        let second = orch
            .execute(TaskRequest::new("research").with_project("acme"))
            .await
            .unwrap();
        assert_eq!(second.context.as_ref(), Some(&stored.payload));
    }

    #[tokio::test]
    async fn test_product_task_drives_workflow() {
        let orch = orchestrator();
        let mut rx = orch.subscribe();
        orch.register_agent(
            RegisterRequest::new(Role::BackendDeveloper, "be"),
            echo("be"),
        )
        .unwrap();

        orch.execute(
            TaskRequest::new("code-generation")
                .with_description("build a new customer portal app")
                .with_project("portal"),
        )
        .await
        .unwrap();

        let view = orch.workflows().visualization("portal").unwrap();
        let build = view
            .phases
            .iter()
            .find(|p| p.phase == crate::workflow::Phase::Build)
            .unwrap();
        assert!(build.completed);
        assert_eq!(view.results.len(), 1);

        let mut names = Vec::new();
        while let Ok(e) = rx.try_recv() {
            names.push(e.name());
        }
        assert_eq!(
            names,
            vec![
                "agent:registered",
                "task:submitted",
                "workflow:started",
                "workflow:phase_completed",
                "task:completed",
            ]
        );
    }

    #[tokio::test]
    async fn test_health_check_moves_agents_in_and_out_of_error() {
        let orch = orchestrator();
        let flaky = Arc::new(Flaky {
            healthy: false.into(),
        });
        let agent = orch
            .register_agent(RegisterRequest::new(Role::QaEngineer, "flaky"), flaky.clone())
            .unwrap();

        let report = orch.health_check().await;
        assert!(!report[0].healthy);
        assert_eq!(report[0].status, AgentStatus::Error);
        assert_eq!(orch.get_metrics().active_agent_count, 0);
        assert!(orch.registry().list_idle(None).is_empty());

        flaky
            .healthy
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let report = orch.health_check().await;
        assert!(report[0].healthy);
        assert_eq!(orch.registry().get(agent.id).unwrap().status, AgentStatus::Idle);
    }

    struct SlowProbe;

    #[async_trait::async_trait]
    impl AgentExecutor for SlowProbe {
        fn name(&self) -> &str {
            "slow-probe"
        }

        async fn execute(&self, _task: &Task) -> ForemanResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(serde_json::json!("ok"))
        }

        async fn health(&self) -> bool {
            tokio::time::sleep(Duration::from_millis(50)).await;
            false
        }
    }

    #[tokio::test]
    async fn test_health_check_does_not_flag_agent_claimed_during_probe() {
        let orch = Arc::new(orchestrator());
        let agent = orch
            .register_agent(RegisterRequest::new(Role::QaEngineer, "qa"), Arc::new(SlowProbe))
            .unwrap();

        let checker = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.health_check().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let task = orch.submit(TaskRequest::new("testing"));
        let run = orch.dispatch_detached(task.id);

        let report = checker.await.unwrap();
        assert!(!report[0].healthy);
        assert_eq!(report[0].status, AgentStatus::Busy);

        let during = orch.registry().get(agent.id).unwrap();
        assert_eq!(during.status, AgentStatus::Busy);
        assert_eq!(during.workload, 1);

        let done = run.await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        let after = orch.registry().get(agent.id).unwrap();
        assert_eq!(after.status, AgentStatus::Idle);
        assert_eq!(after.workload, 0);
    }

    #[tokio::test]
    async fn test_deregister_and_shutdown() {
        let orch = orchestrator();
        let a = orch
            .register_agent(RegisterRequest::new(Role::DataAnalyst, "da"), echo("da"))
            .unwrap();
        orch.register_agent(RegisterRequest::new(Role::UxDesigner, "ux"), echo("ux"))
            .unwrap();
        orch.deregister_agent(a.id).unwrap();
        assert_eq!(orch.agents().len(), 1);

        orch.initiate_handoff(
            Role::UxDesigner,
            Role::FrontendDeveloper,
            serde_json::json!({}),
            Some(Duration::from_secs(60)),
        );
        let report = orch.shutdown();
        assert_eq!(
            report,
            ShutdownReport {
                agents_removed: 1,
                handoffs_cancelled: 1
            }
        );
        assert!(orch.agents().is_empty());
    }
}
