use crate::events::{EventBus, OrchestratorEvent};
use chrono::{DateTime, Utc};
use foreman_core::{ForemanError, ForemanResult, Role};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// State of a handoff. `completed` and `timed_out` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Initiated,
    Completed,
    TimedOut,
}

/// A timed transfer of deliverables from one role to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    pub id: Uuid,
    pub from: Role,
    pub to: Role,
    pub deliverables: serde_json::Value,
    pub timeout_ms: u64,
    pub status: HandoffStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

struct Entry {
    handoff: Handoff,
    deadline: Instant,
    timer: Option<AbortHandle>,
}

impl Entry {
    /// Move to a terminal state and stop the deadline timer.
    fn resolve(&mut self, status: HandoffStatus) -> Handoff {
        self.handoff.status = status;
        self.handoff.resolved_at = Some(Utc::now());
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.handoff.clone()
    }
}

type Entries = Arc<Mutex<HashMap<Uuid, Entry>>>;

/// Owns every handoff and its deadline timer.
///
/// Both transitions out of `initiated` run under the same lock and only the
/// transition that wins publishes an event, so a handoff ends up `completed`
/// or `timed_out`, never both, and each event fires exactly once.
pub struct HandoffManager {
    entries: Entries,
    events: Arc<EventBus>,
}

impl HandoffManager {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Create a handoff and start its deadline timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initiate(
        &self,
        from: Role,
        to: Role,
        deliverables: serde_json::Value,
        timeout: Duration,
    ) -> Handoff {
        let handoff = Handoff {
            id: Uuid::new_v4(),
            from,
            to,
            deliverables,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            status: HandoffStatus::Initiated,
            created_at: Utc::now(),
            resolved_at: None,
        };
        let id = handoff.id;

        {
            let mut entries = self.entries.lock();
            entries.insert(
                id,
                Entry {
                    handoff: handoff.clone(),
                    deadline: Instant::now() + timeout,
                    timer: None,
                },
            );
            info!(handoff_id = %id, from = %from, to = %to, timeout_ms = handoff.timeout_ms, "Handoff initiated");
            self.events
                .publish(OrchestratorEvent::HandoffInitiated(handoff.clone()));

            // The timer starts after the initiated event is published.
            let timer = tokio::spawn(expire_after(
                Arc::clone(&self.entries),
                Arc::clone(&self.events),
                id,
                timeout,
            ));
            if let Some(entry) = entries.get_mut(&id) {
                entry.timer = Some(timer.abort_handle());
            }
        }
        handoff
    }

    /// Acknowledge receipt on behalf of the destination role.
    ///
    /// Acknowledging a completed handoff again returns it unchanged. A handoff
    /// that has timed out stays timed out and the call fails.
    pub fn acknowledge(&self, id: Uuid) -> ForemanResult<Handoff> {
        let outcome = {
            let mut entries = self.entries.lock();
            let entry = entries
                .get_mut(&id)
                .ok_or_else(|| ForemanError::not_found("handoff", id))?;
            match entry.handoff.status {
                HandoffStatus::Completed => return Ok(entry.handoff.clone()),
                HandoffStatus::TimedOut => {
                    return Err(ForemanError::InvalidState(format!(
                        "handoff {id} already timed out"
                    )));
                }
                HandoffStatus::Initiated if Instant::now() >= entry.deadline => {
                    entry.resolve(HandoffStatus::TimedOut)
                }
                HandoffStatus::Initiated => entry.resolve(HandoffStatus::Completed),
            }
        };

        if outcome.status == HandoffStatus::TimedOut {
            // The deadline passed before the timer task got to run.
            warn!(handoff_id = %id, "Handoff acknowledged after its deadline");
            self.events
                .publish(OrchestratorEvent::HandoffTimeout(outcome));
            return Err(ForemanError::InvalidState(format!(
                "handoff {id} already timed out"
            )));
        }

        info!(handoff_id = %id, to = %outcome.to, "Handoff completed");
        self.events
            .publish(OrchestratorEvent::HandoffCompleted(outcome.clone()));
        Ok(outcome)
    }

    pub fn get(&self, id: Uuid) -> ForemanResult<Handoff> {
        self.entries
            .lock()
            .get(&id)
            .map(|e| e.handoff.clone())
            .ok_or_else(|| ForemanError::not_found("handoff", id))
    }

    /// All handoffs, oldest first.
    pub fn list(&self) -> Vec<Handoff> {
        let mut handoffs: Vec<Handoff> = self
            .entries
            .lock()
            .values()
            .map(|e| e.handoff.clone())
            .collect();
        handoffs.sort_by_key(|h| h.created_at);
        handoffs
    }

    /// Handoffs still waiting for `role` to acknowledge them.
    pub fn pending_for(&self, role: Role) -> Vec<Handoff> {
        self.list()
            .into_iter()
            .filter(|h| h.to == role && h.status == HandoffStatus::Initiated)
            .collect()
    }

    /// Stop every pending timer without firing timeout events and forget all
    /// handoffs.
    pub fn cancel_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let mut pending = 0;
        for timer in entries.values_mut().filter_map(|e| e.timer.take()) {
            timer.abort();
            pending += 1;
        }
        entries.clear();
        pending
    }
}

async fn expire_after(entries: Entries, events: Arc<EventBus>, id: Uuid, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    let expired = {
        let mut entries = entries.lock();
        match entries.get_mut(&id) {
            Some(entry) if entry.handoff.status == HandoffStatus::Initiated => {
                entry.timer = None;
                Some(entry.resolve(HandoffStatus::TimedOut))
            }
            _ => None,
        }
    };
    if let Some(handoff) = expired {
        warn!(handoff_id = %id, to = %handoff.to, timeout_ms = handoff.timeout_ms, "Handoff timed out");
        events.publish(OrchestratorEvent::HandoffTimeout(handoff));
    }
}
