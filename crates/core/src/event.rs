//! Domain events published over the invocation lifecycle.
//!
//! Subscribers (logging sinks, tests) observe what each phase did without the
//! runtime knowing who listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An invocation passed validation
    InvocationStarted {
        actor_id: String,
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Pre-invocation memory load finished
    PreferencesLoaded {
        actor_id: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The model produced the final response
    ResponseGenerated {
        session_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Post-invocation save finished
    TurnSaved {
        actor_id: String,
        session_id: String,
        event_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A hook failed; the request carried on
    HookFailed {
        hook: String,
        phase: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
