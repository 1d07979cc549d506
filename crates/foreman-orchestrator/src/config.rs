use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scoring constants used by the task router.
///
/// The defaults are not derived from any measured policy; treat them as
/// calibration targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingWeights {
    /// Points per matched required capability.
    #[serde(default = "default_capability_weight")]
    pub capability_weight: i64,
    /// Minutes of inactivity after which the recency bonus reaches zero.
    #[serde(default = "default_recency_window")]
    pub recency_window_minutes: i64,
}

impl Default for RoutingWeights {
    fn default() -> Self {
        Self {
            capability_weight: default_capability_weight(),
            recency_window_minutes: default_recency_window(),
        }
    }
}

/// Orchestrator configuration, usually the `[orchestrator]` table of `foreman.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub routing: RoutingWeights,
    /// Upper bound on a single `execute` call. `None` waits forever.
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: Option<u64>,
    /// Timeout for handoffs that do not specify one.
    #[serde(default = "default_handoff_timeout_ms")]
    pub default_handoff_timeout_ms: u64,
    /// Replaces the built-in product-development keywords when non-empty.
    #[serde(default)]
    pub workflow_keywords: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            routing: RoutingWeights::default(),
            execution_timeout_ms: default_execution_timeout_ms(),
            default_handoff_timeout_ms: default_handoff_timeout_ms(),
            workflow_keywords: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }

    pub fn default_handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.default_handoff_timeout_ms)
    }
}

fn default_capability_weight() -> i64 {
    10
}

fn default_recency_window() -> i64 {
    100
}

fn default_execution_timeout_ms() -> Option<u64> {
    Some(300_000)
}

fn default_handoff_timeout_ms() -> u64 {
    30_000
}
