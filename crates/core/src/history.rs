//! Persisted conversation history: an ordered, durable log per thread.
//!
//! The orchestrator reads a thread at turn start and appends the turn's new
//! entries at turn end. Besides messages, a thread carries the
//! `fact_added_in_last_run` flag so it survives between turns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::HistoryError;
use crate::ids::{AssistantId, UserId};
use crate::message::Message;

/// Identifier of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// The thread shared by one assistant and one user.
    pub fn for_pair(assistant_id: &AssistantId, user_id: &UserId) -> Self {
        Self(format!("{assistant_id}:{user_id}"))
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of a thread as loaded at turn start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thread {
    /// All persisted entries, oldest first
    pub messages: Vec<Message>,

    /// Set when the previous turn saved a user fact successfully
    #[serde(default)]
    pub fact_added_in_last_run: bool,
}

/// Durable per-thread history.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Load a thread. Unknown threads load as empty.
    async fn load(&self, thread: &ThreadId) -> Result<Thread, HistoryError>;

    /// Append entries and record the fact flag for the next turn.
    async fn append(
        &self,
        thread: &ThreadId,
        messages: &[Message],
        fact_added_in_last_run: bool,
    ) -> Result<(), HistoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_joins_assistant_and_user() {
        let id = ThreadId::for_pair(&AssistantId::new("a1"), &UserId::new("u7"));
        assert_eq!(id.to_string(), "a1:u7");
    }

    #[test]
    fn empty_thread_defaults() {
        let thread = Thread::default();
        assert!(thread.messages.is_empty());
        assert!(!thread.fact_added_in_last_run);
    }
}
