use chrono::{DateTime, Utc};
use foreman_core::{ForemanError, ForemanResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The remembered context of one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub project_id: String,
    pub payload: serde_json::Value,
    /// Who wrote it, e.g. the role of the agent that produced the result.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// In-memory, per-project memory of past results.
///
/// One entry per project; the last write wins. Nothing is versioned or
/// merged, and everything is lost on restart.
#[derive(Default)]
pub struct ContextStore {
    entries: RwLock<HashMap<String, ContextEntry>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the project's entry.
    pub fn put(
        &self,
        project_id: impl Into<String>,
        payload: serde_json::Value,
        source: impl Into<String>,
    ) -> ContextEntry {
        let entry = ContextEntry {
            project_id: project_id.into(),
            payload,
            source: source.into(),
            timestamp: Utc::now(),
        };
        self.entries
            .write()
            .insert(entry.project_id.clone(), entry.clone());
        entry
    }

    pub fn get(&self, project_id: &str) -> ForemanResult<ContextEntry> {
        self.entries
            .read()
            .get(project_id)
            .cloned()
            .ok_or_else(|| ForemanError::not_found("context", project_id))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
