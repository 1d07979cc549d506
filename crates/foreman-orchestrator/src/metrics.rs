use foreman_core::Role;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-role execution counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleMetrics {
    pub completed: u64,
    pub failed: u64,
    pub total_duration_ms: f64,
}

/// Point-in-time copy of the orchestrator counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Exact running mean of completed task durations.
    pub average_response_time_ms: f64,
    pub active_agent_count: usize,
    pub by_role: BTreeMap<Role, RoleMetrics>,
}

#[derive(Debug, Default)]
struct Accumulator {
    total_tasks: u64,
    completed_tasks: u64,
    failed_tasks: u64,
    average_response_time_ms: f64,
    by_role: BTreeMap<Role, RoleMetrics>,
}

/// Single-writer accumulator for task metrics.
///
/// Every update takes the same lock, so the running average is never
/// computed from a torn read.
pub struct MetricsCollector {
    inner: Mutex<Accumulator>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Accumulator::default()),
        }
    }

    /// Count a newly submitted task.
    pub fn record_submitted(&self) {
        self.inner.lock().total_tasks += 1;
    }

    /// Count a completed task and fold its duration into the running mean.
    pub fn record_completed(&self, role: Role, duration_ms: f64) {
        let mut acc = self.inner.lock();
        acc.completed_tasks += 1;
        let n = acc.completed_tasks as f64;
        acc.average_response_time_ms += (duration_ms - acc.average_response_time_ms) / n;

        let entry = acc.by_role.entry(role).or_default();
        entry.completed += 1;
        entry.total_duration_ms += duration_ms;
    }

    /// Count a failed task. Routing failures have no role.
    pub fn record_failed(&self, role: Option<Role>) {
        let mut acc = self.inner.lock();
        acc.failed_tasks += 1;
        if let Some(role) = role {
            acc.by_role.entry(role).or_default().failed += 1;
        }
    }

    pub fn snapshot(&self, active_agent_count: usize) -> MetricsSnapshot {
        let acc = self.inner.lock();
        MetricsSnapshot {
            total_tasks: acc.total_tasks,
            completed_tasks: acc.completed_tasks,
            failed_tasks: acc.failed_tasks,
            average_response_time_ms: acc.average_response_time_ms,
            active_agent_count,
            by_role: acc.by_role.clone(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
