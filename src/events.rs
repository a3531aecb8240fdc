use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::agents::{AgentId, Availability};
use crate::canvas::WidgetKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Typed inter-component events. Replaces ad-hoc document-level event
/// dispatch with a single broadcast channel of typed payloads.
#[derive(Debug, Clone, Serialize)]
pub enum CanvasEvent {
    AgentStatusChanged {
        agent_id: AgentId,
        availability: Availability,
    },
    QueryStarted {
        query_id: Uuid,
        widget_id: String,
    },
    QueryCompleted {
        query_id: Uuid,
        widget_id: String,
        from_cache: bool,
        synthesized: bool,
    },
    QueryFailed {
        query_id: Uuid,
        widget_id: String,
        error: String,
    },
    WidgetCreated {
        widget_id: Uuid,
        kind: WidgetKind,
    },
    WidgetClosed {
        widget_id: Uuid,
    },
    Notification {
        level: NotificationLevel,
        message: String,
    },
}

/// Broadcast bus shared by the registry, orchestrator, and widget manager.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CanvasEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: CanvasEvent) {
        if self.sender.send(event).is_err() {
            debug!("No subscribers for canvas event, continuing");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CanvasEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();

        bus.publish(CanvasEvent::Notification {
            level: NotificationLevel::Info,
            message: "hello".to_string(),
        });

        match receiver.recv().await.unwrap() {
            CanvasEvent::Notification { level, message } => {
                assert_eq!(level, NotificationLevel::Info);
                assert_eq!(message, "hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(CanvasEvent::WidgetClosed {
            widget_id: Uuid::new_v4(),
        });
    }
}
