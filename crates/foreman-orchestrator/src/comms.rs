use crate::events::{EventBus, OrchestratorEvent};
use crate::handoff::{Handoff, HandoffManager};
use foreman_core::{AgentMessage, ForemanResult, MessagePriority, Role};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Append-only log of role-addressed messages.
///
/// Recipients pull with [`MessageLog::messages_for`]; reading never removes
/// anything.
#[derive(Default)]
pub struct MessageLog {
    messages: RwLock<Vec<AgentMessage>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: AgentMessage) {
        self.messages.write().push(message);
    }

    pub fn messages_for(&self, role: Role) -> Vec<AgentMessage> {
        self.filtered(|m| m.to == role)
    }

    pub fn messages_from(&self, role: Role) -> Vec<AgentMessage> {
        self.filtered(|m| m.from == role)
    }

    pub fn all(&self) -> Vec<AgentMessage> {
        self.messages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, keep: impl Fn(&AgentMessage) -> bool) -> Vec<AgentMessage> {
        self.messages
            .read()
            .iter()
            .filter(|m| keep(m))
            .cloned()
            .collect()
    }
}

/// Message passing and handoffs between roles.
pub struct CommunicationLayer {
    log: MessageLog,
    handoffs: HandoffManager,
    events: Arc<EventBus>,
}

impl CommunicationLayer {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            log: MessageLog::new(),
            handoffs: HandoffManager::new(Arc::clone(&events)),
            events,
        }
    }

    /// Append a message to the log. There is no delivery beyond the append.
    pub fn send_message(
        &self,
        from: Role,
        to: Role,
        payload: serde_json::Value,
        priority: MessagePriority,
    ) -> AgentMessage {
        let message = AgentMessage::new(from, to, payload, priority);
        debug!(message_id = %message.id, from = %from, to = %to, "Message sent");
        self.log.append(message.clone());
        self.events
            .publish(OrchestratorEvent::MessageSent(message.clone()));
        message
    }

    pub fn messages_for(&self, role: Role) -> Vec<AgentMessage> {
        self.log.messages_for(role)
    }

    pub fn messages_from(&self, role: Role) -> Vec<AgentMessage> {
        self.log.messages_from(role)
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Start a handoff and leave a high-priority note in the destination's
    /// inbox so it can discover the handoff by pulling messages.
    pub fn initiate_handoff(
        &self,
        from: Role,
        to: Role,
        deliverables: serde_json::Value,
        timeout: Duration,
    ) -> Handoff {
        let handoff = self.handoffs.initiate(from, to, deliverables, timeout);
        self.send_message(
            from,
            to,
            serde_json::json!({
                "kind": "handoff",
                "handoff_id": handoff.id,
                "deliverables": handoff.deliverables,
                "timeout_ms": handoff.timeout_ms,
            }),
            MessagePriority::High,
        );
        handoff
    }

    pub fn acknowledge_handoff(&self, id: Uuid) -> ForemanResult<Handoff> {
        self.handoffs.acknowledge(id)
    }

    pub fn handoff(&self, id: Uuid) -> ForemanResult<Handoff> {
        self.handoffs.get(id)
    }

    pub fn handoffs(&self) -> &HandoffManager {
        &self.handoffs
    }

    /// Cancel pending handoff timers. Returns how many were pending.
    pub fn shutdown(&self) -> usize {
        self.handoffs.cancel_all()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::handoff::HandoffStatus;

    #[test]
    fn test_messages_are_a_log_not_a_queue() {
        let comms = CommunicationLayer::new(Arc::new(EventBus::new()));
        comms.send_message(
            Role::ProductManager,
            Role::UxDesigner,
            serde_json::json!("brief"),
            MessagePriority::Normal,
        );
        comms.send_message(
            Role::DataAnalyst,
            Role::UxDesigner,
            serde_json::json!("funnel numbers"),
            MessagePriority::Low,
        );
        comms.send_message(
            Role::UxDesigner,
            Role::FrontendDeveloper,
            serde_json::json!("mockups"),
            MessagePriority::High,
        );

        assert_eq!(comms.messages_for(Role::UxDesigner).len(), 2);
        // Reading does not consume.
        assert_eq!(comms.messages_for(Role::UxDesigner).len(), 2);
        assert_eq!(comms.messages_from(Role::UxDesigner).len(), 1);
        assert!(comms.messages_for(Role::SupportEngineer).is_empty());
        assert_eq!(comms.log().len(), 3);
    }

    #[test]
    fn test_message_order_is_preserved() {
        let comms = CommunicationLayer::new(Arc::new(EventBus::new()));
        for i in 0..5 {
            comms.send_message(
                Role::QaEngineer,
                Role::BackendDeveloper,
                serde_json::json!(i),
                MessagePriority::Normal,
            );
        }
        let payloads: Vec<_> = comms
            .messages_for(Role::BackendDeveloper)
            .into_iter()
            .map(|m| m.payload)
            .collect();
        assert_eq!(payloads, (0..5).map(|i| serde_json::json!(i)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_handoff_leaves_inbox_note() {
        let events = Arc::new(EventBus::new());
        let mut rx = events.subscribe();
        let comms = CommunicationLayer::new(events);

        let h = comms.initiate_handoff(
            Role::BackendDeveloper,
            Role::QaEngineer,
            serde_json::json!({"branch": "feature/login"}),
            Duration::from_secs(5),
        );

        let inbox = comms.messages_for(Role::QaEngineer);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].payload["kind"], "handoff");
        assert_eq!(inbox[0].payload["handoff_id"], serde_json::json!(h.id));
        assert_eq!(inbox[0].priority, MessagePriority::High);

        let done = comms.acknowledge_handoff(h.id).unwrap();
        assert_eq!(done.status, HandoffStatus::Completed);

        let mut names = Vec::new();
        while let Ok(e) = rx.try_recv() {
            names.push(e.name());
        }
        assert_eq!(
            names,
            vec!["handoff:initiated", "message:sent", "handoff:completed"]
        );
    }
}
