//! Domain event system — decoupled observation of the orchestrator.
//!
//! Events are published when something interesting happens (a turn ends, a
//! tool runs, an instance is rebuilt). Operators and tests subscribe without
//! coupling to the components that emit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::error::ErrorCode;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A turn produced a reply
    TurnCompleted {
        assistant_id: String,
        user_id: String,
        model_calls: u32,
        tool_calls: u32,
        timestamp: DateTime<Utc>,
    },

    /// A turn ended with a structured failure
    TurnFailed {
        assistant_id: String,
        user_id: String,
        code: ErrorCode,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Older history was folded into the summary
    ContextCompacted {
        summarized_through: usize,
        estimated_tokens: usize,
        timestamp: DateTime<Utc>,
    },

    /// An assistant instance was built on a cache miss
    InstanceBuilt {
        assistant_id: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A cached instance was replaced because the remote config is newer
    InstanceRebuilt {
        assistant_id: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Remote configuration could not be trusted; a stale instance kept serving
    ConfigurationDefect {
        assistant_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
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
