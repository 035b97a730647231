//! Domain event system — structured observability for orchestration sessions.
//!
//! The controller publishes an event for every state transition and tool
//! invocation. Collectors subscribe without the loop knowing who listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A user turn entered the loop
    TurnStarted {
        session_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The controller moved between states
    StateChanged {
        session_id: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// The catalog answered a relevance query
    ToolsDiscovered {
        session_id: String,
        tool_names: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The model returned a turn
    CompletionReceived {
        session_id: String,
        model: String,
        stop_reason: String,
        tool_calls: usize,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// Text the model produced alongside tool calls, before they run
    CommentaryEmitted {
        session_id: String,
        round: u32,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolInvoked {
        session_id: String,
        call_id: String,
        vendor_name: String,
        canonical_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A turn reached a plain answer
    TurnCompleted {
        session_id: String,
        rounds: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn failed; history was left as it was before the turn
    TurnFailed {
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::TurnStarted { session_id, .. }
            | Self::StateChanged { session_id, .. }
            | Self::ToolsDiscovered { session_id, .. }
            | Self::CompletionReceived { session_id, .. }
            | Self::CommentaryEmitted { session_id, .. }
            | Self::ToolInvoked { session_id, .. }
            | Self::TurnCompleted { session_id, .. }
            | Self::TurnFailed { session_id, .. } => session_id,
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Subscribers filter by `session_id` if they only care about one session.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
