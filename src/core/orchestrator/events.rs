//! Typed lifecycle events. The event set is closed, so subscribers get a
//! tagged enum over a broadcast channel rather than stringly-typed topics.

use tokio::sync::broadcast;

use crate::core::task::{AgentRecord, Task};

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Started,
    Stopped,
    TaskAdded(Task),
    AgentSpawned(AgentRecord),
    AgentCompleted(AgentRecord),
    AgentFailed { agent: AgentRecord, error: String },
    TaskCompleted { task_id: String },
}

impl OrchestratorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorEvent::Started => "started",
            OrchestratorEvent::Stopped => "stopped",
            OrchestratorEvent::TaskAdded(_) => "task_added",
            OrchestratorEvent::AgentSpawned(_) => "agent_spawned",
            OrchestratorEvent::AgentCompleted(_) => "agent_completed",
            OrchestratorEvent::AgentFailed { .. } => "agent_failed",
            OrchestratorEvent::TaskCompleted { .. } => "task_completed",
        }
    }
}

/// Fan-out bus for [OrchestratorEvent]. Subscribers attach before `start()`
/// to observe every event; slow subscribers may miss events once the
/// channel's backlog overflows, which broadcast surfaces as `Lagged`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }

    /// Send to all current subscribers. Emitting with no subscribers is
    /// not an error.
    pub(crate) fn emit(&self, event: OrchestratorEvent) {
        tracing::debug!("event: {}", event.kind());
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
