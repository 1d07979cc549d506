use crate::catalog::CapabilityCatalog;
use crate::types::{Agent, AgentStatus, CapabilitySet};
use chrono::{DateTime, Utc};
use foreman_core::{AgentId, ForemanError, ForemanResult, Role};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Parameters for [`AgentRegistry::register`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub role: Role,
    pub name: String,
    /// Overrides the role's catalog capabilities.
    #[serde(default)]
    pub capabilities: Option<CapabilitySet>,
    /// Overrides the role's catalog capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Explicit id; a fresh one is generated when absent.
    #[serde(default)]
    pub id: Option<AgentId>,
}

impl RegisterRequest {
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            capabilities: None,
            capacity: None,
            id: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Mutable part of an agent record. Only ever touched under the slot lock.
#[derive(Debug)]
struct SlotState {
    status: AgentStatus,
    last_activity: DateTime<Utc>,
    workload: u32,
}

/// One agent in the arena. Identity fields are immutable after registration.
#[derive(Debug)]
struct AgentSlot {
    id: AgentId,
    name: String,
    role: Role,
    capabilities: CapabilitySet,
    capacity: u32,
    state: Mutex<SlotState>,
}

impl AgentSlot {
    fn snapshot(&self) -> Agent {
        let state = self.state.lock();
        Agent {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            capabilities: self.capabilities.clone(),
            status: state.status,
            last_activity: state.last_activity,
            capacity: self.capacity,
            workload: state.workload,
        }
    }
}

#[derive(Debug, Default)]
struct Arena {
    /// Slots in registration order; the router's tie-break depends on it.
    slots: Vec<Arc<AgentSlot>>,
    index: HashMap<AgentId, usize>,
}

impl Arena {
    fn reindex(&mut self) {
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
    }
}

/// Registry of live agents.
///
/// Status and workload mutations are serialized per agent through the slot
/// lock, so concurrent `mark_busy` calls can never push an agent past its
/// capacity. The arena lock is only held long enough to find a slot.
pub struct AgentRegistry {
    catalog: Arc<CapabilityCatalog>,
    arena: RwLock<Arena>,
}

impl AgentRegistry {
    pub fn new(catalog: Arc<CapabilityCatalog>) -> Self {
        Self {
            catalog,
            arena: RwLock::new(Arena::default()),
        }
    }

    pub fn catalog(&self) -> &Arc<CapabilityCatalog> {
        &self.catalog
    }

    /// Register an agent. Capabilities and capacity are seeded from the
    /// catalog unless the request overrides them.
    pub fn register(&self, request: RegisterRequest) -> ForemanResult<Agent> {
        let capacity = request
            .capacity
            .unwrap_or_else(|| self.catalog.capacity_of(request.role));
        if capacity == 0 {
            return Err(ForemanError::Config(format!(
                "agent '{}' must have a capacity of at least 1",
                request.name
            )));
        }

        let slot = Arc::new(AgentSlot {
            id: request.id.unwrap_or_else(Uuid::new_v4),
            name: request.name,
            role: request.role,
            capabilities: request
                .capabilities
                .unwrap_or_else(|| self.catalog.capabilities_of(request.role)),
            capacity,
            state: Mutex::new(SlotState {
                status: AgentStatus::Idle,
                last_activity: Utc::now(),
                workload: 0,
            }),
        });

        let mut arena = self.arena.write();
        if arena.index.contains_key(&slot.id) {
            return Err(ForemanError::DuplicateRegistration(slot.id));
        }
        let pos = arena.slots.len();
        arena.index.insert(slot.id, pos);
        arena.slots.push(Arc::clone(&slot));
        drop(arena);

        info!(agent_id = %slot.id, role = %slot.role, capacity, "Agent registered");
        Ok(slot.snapshot())
    }

    /// Remove an agent. Agents with assigned work cannot be removed.
    pub fn deregister(&self, id: AgentId) -> ForemanResult<Agent> {
        let mut arena = self.arena.write();
        let pos = *arena
            .index
            .get(&id)
            .ok_or_else(|| ForemanError::not_found("agent", id))?;
        let agent = arena.slots[pos].snapshot();
        if agent.workload > 0 {
            return Err(ForemanError::InvalidState(format!(
                "agent {id} still has {} task(s) assigned",
                agent.workload
            )));
        }
        arena.slots.remove(pos);
        arena.reindex();
        drop(arena);

        info!(agent_id = %id, role = %agent.role, "Agent deregistered");
        Ok(agent)
    }

    /// Drop every agent. Used on orchestrator shutdown.
    pub fn clear(&self) -> usize {
        let mut arena = self.arena.write();
        let count = arena.slots.len();
        arena.slots.clear();
        arena.index.clear();
        count
    }

    fn slot(&self, id: AgentId) -> ForemanResult<Arc<AgentSlot>> {
        let arena = self.arena.read();
        arena
            .index
            .get(&id)
            .map(|&pos| Arc::clone(&arena.slots[pos]))
            .ok_or_else(|| ForemanError::not_found("agent", id))
    }

    fn slots(&self) -> Vec<Arc<AgentSlot>> {
        self.arena.read().slots.clone()
    }

    pub fn get(&self, id: AgentId) -> ForemanResult<Agent> {
        Ok(self.slot(id)?.snapshot())
    }

    /// Snapshot of every agent, in registration order.
    pub fn list(&self) -> Vec<Agent> {
        self.slots().iter().map(|s| s.snapshot()).collect()
    }

    /// Idle agents whose capabilities cover `filter`, in registration order.
    pub fn list_idle(&self, filter: Option<&CapabilitySet>) -> Vec<Agent> {
        self.slots()
            .iter()
            .map(|s| s.snapshot())
            .filter(|a| a.status == AgentStatus::Idle)
            .filter(|a| filter.map_or(true, |f| a.covers(f)))
            .collect()
    }

    /// Take one unit of workload on the agent.
    pub fn mark_busy(&self, id: AgentId) -> ForemanResult<Agent> {
        let slot = self.slot(id)?;
        {
            let mut state = slot.state.lock();
            if state.status == AgentStatus::Error {
                return Err(ForemanError::InvalidState(format!(
                    "agent {id} is in error state"
                )));
            }
            if state.workload >= slot.capacity {
                return Err(ForemanError::CapacityExceeded {
                    agent_id: id,
                    capacity: slot.capacity,
                });
            }
            state.workload += 1;
            state.status = AgentStatus::Busy;
            debug!(agent_id = %id, workload = state.workload, "Agent marked busy");
        }
        Ok(slot.snapshot())
    }

    /// Release one unit of workload. Never goes below zero.
    pub fn mark_free(&self, id: AgentId) -> ForemanResult<Agent> {
        let slot = self.slot(id)?;
        {
            let mut state = slot.state.lock();
            state.workload = state.workload.saturating_sub(1);
            if state.workload == 0 && state.status == AgentStatus::Busy {
                state.status = AgentStatus::Idle;
            }
            debug!(agent_id = %id, workload = state.workload, "Agent marked free");
        }
        Ok(slot.snapshot())
    }

    /// Set the agent's status.
    ///
    /// `busy` requires assigned work and `idle` requires none; `error` can be
    /// set at any time.
    pub fn set_status(&self, id: AgentId, status: AgentStatus) -> ForemanResult<Agent> {
        let slot = self.slot(id)?;
        {
            let mut state = slot.state.lock();
            match status {
                AgentStatus::Idle if state.workload > 0 => {
                    return Err(ForemanError::InvalidState(format!(
                        "agent {id} has {} task(s) and cannot be idle",
                        state.workload
                    )));
                }
                AgentStatus::Busy if state.workload == 0 => {
                    return Err(ForemanError::InvalidState(format!(
                        "agent {id} has no tasks and cannot be busy"
                    )));
                }
                _ => state.status = status,
            }
        }
        Ok(slot.snapshot())
    }

    /// Move the agent from `expected` to `next`, checked under the agent's
    /// lock. Returns `Ok(None)` when the agent was no longer in `expected`.
    pub fn set_status_if(
        &self,
        id: AgentId,
        expected: AgentStatus,
        next: AgentStatus,
    ) -> ForemanResult<Option<Agent>> {
        let slot = self.slot(id)?;
        {
            let mut state = slot.state.lock();
            if state.status != expected {
                return Ok(None);
            }
            match next {
                AgentStatus::Idle if state.workload > 0 => return Ok(None),
                AgentStatus::Busy if state.workload == 0 => return Ok(None),
                _ => state.status = next,
            }
        }
        Ok(Some(slot.snapshot()))
    }

    /// Update the agent's last-activity timestamp to now.
    pub fn touch(&self, id: AgentId) -> ForemanResult<()> {
        self.touch_at(id, Utc::now())
    }

    /// Update the agent's last-activity timestamp.
    pub fn touch_at(&self, id: AgentId, at: DateTime<Utc>) -> ForemanResult<()> {
        let slot = self.slot(id)?;
        slot.state.lock().last_activity = at;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.arena.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
