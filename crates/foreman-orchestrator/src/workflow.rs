//! Product-development workflow tracking.
//!
//! A task whose description looks like product work (see
//! [`WorkflowClassifier`]) gets a [`WorkflowState`] with six fixed phases.
//! Each contributing role maps to exactly one phase; a phase is complete once
//! any contribution to it succeeds.

use crate::types::Task;
use chrono::{DateTime, Utc};
use foreman_core::{ForemanError, ForemanResult, Role};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Pipeline stage of a product-development workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discovery,
    Design,
    Build,
    Release,
    Growth,
    Maintenance,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Discovery,
        Phase::Design,
        Phase::Build,
        Phase::Release,
        Phase::Growth,
        Phase::Maintenance,
    ];

    /// The phase a role contributes to.
    pub fn for_role(role: Role) -> Phase {
        match role {
            Role::ProductManager | Role::MarketResearcher => Phase::Discovery,
            Role::UxDesigner => Phase::Design,
            Role::FrontendDeveloper | Role::BackendDeveloper => Phase::Build,
            Role::QaEngineer | Role::DevopsEngineer => Phase::Release,
            Role::GrowthMarketer | Role::DataAnalyst => Phase::Growth,
            Role::SecurityAnalyst | Role::SupportEngineer => Phase::Maintenance,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Discovery => "discovery",
            Phase::Design => "design",
            Phase::Build => "build",
            Phase::Release => "release",
            Phase::Growth => "growth",
            Phase::Maintenance => "maintenance",
        };
        f.write_str(name)
    }
}

const DEFAULT_KEYWORDS: &[&str] = &[
    "app",
    "apps",
    "application",
    "platform",
    "product",
    "build",
    "deploy",
    "launch",
    "mvp",
    "saas",
    "website",
    "portal",
    "marketplace",
    "dashboard",
    "startup",
    "ecommerce",
];

/// Keyword heuristic deciding whether a task is product-development work.
///
/// Misclassification is expected; nothing relies on this for correctness.
#[derive(Debug, Clone)]
pub struct WorkflowClassifier {
    pattern: Regex,
}

impl WorkflowClassifier {
    /// Build a classifier from whole-word, case-insensitive keywords. An
    /// empty list falls back to the built-in keywords.
    pub fn new(keywords: &[String]) -> ForemanResult<Self> {
        let words: Vec<String> = if keywords.is_empty() {
            DEFAULT_KEYWORDS.iter().map(|k| regex::escape(k)).collect()
        } else {
            keywords.iter().map(|k| regex::escape(k)).collect()
        };
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|")))
            .map_err(|e| ForemanError::Config(format!("invalid workflow keywords: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn is_product_development(&self, description: &str) -> bool {
        self.pattern.is_match(description)
    }

    pub fn classify(&self, task: &Task) -> bool {
        self.is_product_development(&task.description)
    }
}

/// Progress of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub completed: bool,
    pub contributors: Vec<Role>,
}

/// Progress of one project's workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub project_id: String,
    pub task_id: Uuid,
    /// Always the six phases, in [`Phase::ALL`] order.
    pub phases: Vec<PhaseProgress>,
    pub results: Vec<serde_json::Value>,
    pub started_at: DateTime<Utc>,
}

impl WorkflowState {
    fn new(project_id: String, task_id: Uuid) -> Self {
        Self {
            project_id,
            task_id,
            phases: Phase::ALL
                .iter()
                .map(|&phase| PhaseProgress {
                    phase,
                    completed: false,
                    contributors: Vec::new(),
                })
                .collect(),
            results: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseProgress> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn completed_phases(&self) -> Vec<Phase> {
        self.phases
            .iter()
            .filter(|p| p.completed)
            .map(|p| p.phase)
            .collect()
    }
}

/// Read-only projection used by dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub project_id: String,
    pub phases: Vec<PhaseProgress>,
    pub duration_ms: i64,
    pub results: Vec<serde_json::Value>,
}

/// What a contribution did to its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub phase: Phase,
    /// The phase flipped from incomplete to complete with this contribution.
    pub newly_completed: bool,
}

/// Per-project workflow state. Workflows are only removed by the caller.
pub struct WorkflowTracker {
    classifier: WorkflowClassifier,
    workflows: RwLock<HashMap<String, WorkflowState>>,
}

impl WorkflowTracker {
    pub fn new(classifier: WorkflowClassifier) -> Self {
        Self {
            classifier,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    pub fn classify(&self, task: &Task) -> bool {
        self.classifier.classify(task)
    }

    /// Start a fresh workflow for `project_id`, replacing any existing one.
    pub fn start_workflow(&self, project_id: impl Into<String>, task_id: Uuid) -> WorkflowState {
        let state = WorkflowState::new(project_id.into(), task_id);
        info!(project_id = %state.project_id, task_id = %task_id, "Workflow started");
        self.workflows
            .write()
            .insert(state.project_id.clone(), state.clone());
        state
    }

    /// Start a workflow unless the project already has one. Returns the state
    /// and whether it was created.
    pub fn ensure_workflow(&self, project_id: &str, task_id: Uuid) -> (WorkflowState, bool) {
        if let Some(existing) = self.workflows.read().get(project_id) {
            return (existing.clone(), false);
        }
        let mut workflows = self.workflows.write();
        if let Some(existing) = workflows.get(project_id) {
            return (existing.clone(), false);
        }
        let state = WorkflowState::new(project_id.to_string(), task_id);
        workflows.insert(project_id.to_string(), state.clone());
        info!(project_id = %project_id, task_id = %task_id, "Workflow started");
        (state, true)
    }

    /// Record that `role` contributed to the project.
    ///
    /// The role is always listed as a contributor of its phase; the phase is
    /// only marked complete when the contribution succeeded.
    pub fn record_contribution(
        &self,
        project_id: &str,
        role: Role,
        succeeded: bool,
    ) -> ForemanResult<PhaseUpdate> {
        let phase = Phase::for_role(role);
        let mut workflows = self.workflows.write();
        let state = workflows
            .get_mut(project_id)
            .ok_or_else(|| ForemanError::not_found("workflow", project_id))?;
        let progress = state
            .phases
            .iter_mut()
            .find(|p| p.phase == phase)
            .ok_or_else(|| ForemanError::InvalidState(format!("workflow lacks phase {phase}")))?;

        progress.contributors.push(role);
        let newly_completed = succeeded && !progress.completed;
        if succeeded {
            progress.completed = true;
        }
        if newly_completed {
            info!(project_id = %project_id, phase = %phase, role = %role, "Workflow phase completed");
        }
        Ok(PhaseUpdate {
            phase,
            newly_completed,
        })
    }

    /// Append to the project's aggregate results.
    pub fn record_result(&self, project_id: &str, result: serde_json::Value) -> ForemanResult<()> {
        self.workflows
            .write()
            .get_mut(project_id)
            .ok_or_else(|| ForemanError::not_found("workflow", project_id))?
            .results
            .push(result);
        Ok(())
    }

    pub fn get(&self, project_id: &str) -> ForemanResult<WorkflowState> {
        self.workflows
            .read()
            .get(project_id)
            .cloned()
            .ok_or_else(|| ForemanError::not_found("workflow", project_id))
    }

    pub fn visualization(&self, project_id: &str) -> ForemanResult<WorkflowView> {
        let state = self.get(project_id)?;
        Ok(WorkflowView {
            duration_ms: (Utc::now() - state.started_at).num_milliseconds(),
            project_id: state.project_id,
            phases: state.phases,
            results: state.results,
        })
    }

    pub fn remove(&self, project_id: &str) -> ForemanResult<WorkflowState> {
        self.workflows
            .write()
            .remove(project_id)
            .ok_or_else(|| ForemanError::not_found("workflow", project_id))
    }

    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
