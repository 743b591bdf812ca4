//! In-memory stores, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use secretary_core::error::{HistoryError, ServiceError};
use secretary_core::history::{Thread, ThreadId, ThreadStore};
use secretary_core::ids::UserId;
use secretary_core::message::Message;
use secretary_core::services::FactStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread history kept in a map. Lost on restart.
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<ThreadId, Thread>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted entries in a thread.
    pub async fn message_count(&self, thread: &ThreadId) -> usize {
        self.threads
            .read()
            .await
            .get(thread)
            .map_or(0, |t| t.messages.len())
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, thread: &ThreadId) -> Result<Thread, HistoryError> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(
        &self,
        thread: &ThreadId,
        messages: &[Message],
        fact_added_in_last_run: bool,
    ) -> Result<(), HistoryError> {
        let mut threads = self.threads.write().await;
        let entry = threads.entry(thread.clone()).or_default();
        entry.messages.extend_from_slice(messages);
        entry.fact_added_in_last_run = fact_added_in_last_run;
        Ok(())
    }
}

/// Per-user facts kept in a map. Stands in for the backend in tests and
/// offline runs.
#[derive(Default)]
pub struct InMemoryFactStore {
    facts: Arc<RwLock<HashMap<UserId, Vec<String>>>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn add_fact(&self, user_id: &UserId, fact: &str) -> Result<(), ServiceError> {
        self.facts
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .push(fact.to_string());
        Ok(())
    }

    async fn list_facts(&self, user_id: &UserId) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .facts
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
