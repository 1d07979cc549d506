//! Agent orchestration for Foreman.
//!
//! Keeps a registry of role-typed agents, routes each task to exactly one
//! capable agent, drives the task lifecycle, and coordinates roles through a
//! message log, time-boxed handoffs and a product-development workflow
//! tracker.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Engine that owns every subsystem and runs tasks.
//! - [`AgentRegistry`]: Agents with per-agent serialized workload accounting.
//! - [`TaskRouter`]: Capability-and-recency scoring with a deterministic tie-break.
//! - [`CommunicationLayer`]: Message log plus the handoff state machine.
//! - [`WorkflowTracker`]: Six-phase progress per project.
//! - [`AgentExecutor`]: The pluggable "do the work" interface behind each agent.

/// Role to capability defaults.
pub mod catalog;
/// Message log and handoffs.
pub mod comms;
/// Orchestrator configuration.
pub mod config;
/// Per-project context memory.
pub mod context;
/// The orchestration engine.
pub mod engine;
/// Lifecycle event publishing.
pub mod events;
/// Agent execution backends.
pub mod executor;
/// Handoff state machine.
pub mod handoff;
/// Task lifecycle book-keeping.
pub mod ledger;
/// Task metrics accumulator.
pub mod metrics;
/// Agent registry.
pub mod registry;
/// Task routing and scoring.
pub mod router;
/// Shared types (Agent, Task, statuses).
pub mod types;
/// Product-development workflow tracking.
pub mod workflow;

pub use catalog::{default_profiles, CapabilityCatalog, RoleProfile};
pub use comms::{CommunicationLayer, MessageLog};
pub use config::{OrchestratorConfig, RoutingWeights};
pub use context::{ContextEntry, ContextStore};
pub use engine::{AgentHealth, Orchestrator, ShutdownReport};
pub use events::{EventBus, OrchestratorEvent};
pub use executor::{AgentExecutor, EchoExecutor, ExecutorSpec, WebhookExecutor};
pub use handoff::{Handoff, HandoffManager, HandoffStatus};
pub use ledger::TaskLedger;
pub use metrics::{MetricsCollector, MetricsSnapshot, RoleMetrics};
pub use registry::{AgentRegistry, RegisterRequest};
pub use router::{capabilities_for_type, RouteDecision, ScoredAgent, TaskRouter};
pub use types::{
    capability_set, Agent, AgentStatus, CapabilitySet, Task, TaskRequest, TaskStatus,
};
pub use workflow::{
    Phase, PhaseProgress, PhaseUpdate, WorkflowClassifier, WorkflowState, WorkflowTracker,
    WorkflowView,
};
