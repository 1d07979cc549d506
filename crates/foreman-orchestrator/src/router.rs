use crate::config::RoutingWeights;
use crate::registry::AgentRegistry;
use crate::types::{capability_set, Agent, CapabilitySet, Task};
use chrono::{DateTime, Utc};
use foreman_core::{ForemanError, ForemanResult};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Capabilities implied by a declared task type. Unknown types require nothing.
const TASK_TYPE_CAPABILITIES: &[(&str, &[&str])] = &[
    ("code-generation", &["generate", "analyze"]),
    ("code-review", &["analyze", "review"]),
    ("testing", &["test"]),
    ("ui-design", &["design", "prototype"]),
    ("research", &["research", "analyze"]),
    ("planning", &["plan"]),
    ("deployment", &["deploy"]),
    ("monitoring", &["monitor"]),
    ("security-audit", &["audit", "analyze"]),
    ("marketing", &["market", "content"]),
    ("analytics", &["analyze", "report"]),
    ("support", &["support", "debug"]),
];

/// Capability set derived from a task type.
pub fn capabilities_for_type(task_type: &str) -> CapabilitySet {
    TASK_TYPE_CAPABILITIES
        .iter()
        .find(|(t, _)| *t == task_type)
        .map(|(_, caps)| capability_set(caps.iter().copied()))
        .unwrap_or_default()
}

/// A candidate with its score breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredAgent {
    pub agent: Agent,
    pub matched: usize,
    pub recency_bonus: i64,
    pub score: i64,
}

/// Outcome of a successful routing decision.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision {
    pub agent: Agent,
    pub score: i64,
    pub required: CapabilitySet,
}

/// Picks exactly one agent for a task.
///
/// Routing reads a registry snapshot and never mutates it; the caller commits
/// the decision with [`AgentRegistry::mark_busy`].
#[derive(Debug, Clone, Default)]
pub struct TaskRouter {
    weights: RoutingWeights,
}

impl TaskRouter {
    pub fn new(weights: RoutingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RoutingWeights {
        &self.weights
    }

    /// The task's explicit capability set, or the one implied by its type.
    pub fn required_capabilities(&self, task: &Task) -> CapabilitySet {
        task.required_capabilities
            .clone()
            .unwrap_or_else(|| capabilities_for_type(&task.task_type))
    }

    /// `max(0, window - minutes since last activity)`.
    pub fn recency_bonus(&self, agent: &Agent, now: DateTime<Utc>) -> i64 {
        let minutes = (now - agent.last_activity).num_minutes().max(0);
        (self.weights.recency_window_minutes - minutes).max(0)
    }

    pub fn score(&self, agent: &Agent, required: &CapabilitySet, now: DateTime<Utc>) -> ScoredAgent {
        let matched = required.intersection(&agent.capabilities).count();
        let recency_bonus = self.recency_bonus(agent, now);
        ScoredAgent {
            agent: agent.clone(),
            matched,
            recency_bonus,
            score: self.weights.capability_weight * matched as i64 + recency_bonus,
        }
    }

    /// Score every candidate that covers `required`, best first.
    ///
    /// Candidates must be in registration order: the sort is stable, so equal
    /// scores keep that order and the first-registered agent wins.
    pub fn rank(
        &self,
        required: &CapabilitySet,
        candidates: &[Agent],
        now: DateTime<Utc>,
    ) -> Vec<ScoredAgent> {
        let mut scored: Vec<ScoredAgent> = candidates
            .iter()
            .filter(|a| a.covers(required))
            .map(|a| self.score(a, required, now))
            .collect();
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored
    }

    pub fn route(&self, task: &Task, registry: &AgentRegistry) -> ForemanResult<RouteDecision> {
        self.route_at(task, registry, Utc::now())
    }

    /// Route against the registry as seen at `now`.
    pub fn route_at(
        &self,
        task: &Task,
        registry: &AgentRegistry,
        now: DateTime<Utc>,
    ) -> ForemanResult<RouteDecision> {
        let required = self.required_capabilities(task);
        let candidates = registry.list_idle(Some(&required));
        debug!(
            task_id = %task.id,
            candidates = candidates.len(),
            "Routing task"
        );

        let Some(best) = self.rank(&required, &candidates, now).into_iter().next() else {
            let covering_roles = registry.catalog().roles_covering(&required);
            warn!(
                task_id = %task.id,
                required = ?required,
                covering_roles = ?covering_roles,
                "No suitable agent"
            );
            return Err(ForemanError::NoSuitableAgent {
                required: required.iter().cloned().collect(),
                covering_roles,
            });
        };

        info!(
            task_id = %task.id,
            agent_id = %best.agent.id,
            role = %best.agent.role,
            score = best.score,
            "Route decision"
        );

        Ok(RouteDecision {
            agent: best.agent,
            score: best.score,
            required,
        })
    }
}
