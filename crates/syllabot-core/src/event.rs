use tokio::sync::broadcast;

use crate::types::{RunId, ToolResult};

/// Orchestration event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Run started with the given entry actor.
    RunStarted { run_id: RunId, actor: String },
    /// An actor received control.
    ActorActivated { actor: String },
    /// Text streaming from the LLM.
    TextDelta(String),
    /// Tool execution started.
    ToolStart {
        actor: String,
        name: String,
        input: serde_json::Value,
    },
    /// Tool execution completed.
    ToolEnd {
        actor: String,
        name: String,
        result: ToolResult,
    },
    /// Control passed from one actor to another.
    Handoff { from: String, to: String },
    /// Run reached the terminal state.
    RunComplete {
        run_id: RunId,
        final_actor: String,
        handoffs: usize,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Run aborted.
    RunError { run_id: RunId, error: String },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events published after they subscribed.
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: AgentEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Drain every event currently buffered in `rx` without waiting.
pub fn drain(rx: &mut broadcast::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(AgentEvent::ActorActivated {
            actor: "Coordinator".into(),
        });
    }

    #[test]
    fn test_drain_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(AgentEvent::ActorActivated { actor: "Coordinator".into() });
        bus.publish(AgentEvent::Handoff {
            from: "Coordinator".into(),
            to: "WebSearchAgent".into(),
        });

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], AgentEvent::Handoff { ref to, .. } if to == "WebSearchAgent"));
        assert!(drain(&mut rx).is_empty());
    }
}
