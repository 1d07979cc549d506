use crate::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority attached to tasks and messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    /// Background work.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Should be looked at before normal traffic.
    High,
    /// Needs attention now.
    Critical,
}

/// A message sent from one role to another.
///
/// Messages are immutable once created; the message log only ever appends them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// Role that sent the message.
    pub from: Role,
    /// Role the message is addressed to.
    pub to: Role,
    /// Arbitrary structured payload.
    pub payload: serde_json::Value,
    /// Delivery priority, informational only.
    #[serde(default)]
    pub priority: MessagePriority,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Creates a new message stamped with the current time.
    pub fn new(from: Role, to: Role, payload: serde_json::Value, priority: MessagePriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            payload,
            priority,
            timestamp: Utc::now(),
        }
    }
}
