//! Cache of built assistant runtimes keyed by (assistant, user).
//!
//! Each lookup revalidates the cached instance against the remote
//! `updated_at` and rebuilds it when the remote copy is strictly newer.
//! Builds for one key are serialized by a per-key lock; different keys
//! proceed in parallel. A failed fetch or build never evicts a working
//! instance. Every runtime built for a key shares the key's turn lock, so
//! a turn on a replaced runtime still excludes turns on its successor.

use chrono::{DateTime, Utc};
use secretary_core::assistant::AssistantStore;
use secretary_core::error::ConfigurationError;
use secretary_core::event::{DomainEvent, EventBus};
use secretary_core::ids::{AssistantId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use crate::runtime::{AssistantRuntime, RuntimeBuilder, TurnLock};

pub type CacheKey = (AssistantId, UserId);

/// How a lookup was served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Cache miss, a new instance was built
    Built,
    /// The cached instance is current
    Reused,
    /// The remote configuration was newer, the instance was replaced
    Rebuilt,
    /// Revalidation failed; the last good instance keeps serving
    Stale(ConfigurationError),
}

pub struct CacheLookup {
    pub runtime: Arc<AssistantRuntime>,
    pub outcome: LookupOutcome,
}

struct CachedInstance {
    runtime: Arc<AssistantRuntime>,
    loaded_at: DateTime<Utc>,
    checked_at: Instant,
}

#[derive(Default)]
struct SlotState {
    instance: Mutex<Option<CachedInstance>>,
    turn_lock: TurnLock,
}

type Slot = Arc<SlotState>;

pub struct AssistantCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    store: Arc<dyn AssistantStore>,
    builder: Arc<dyn RuntimeBuilder>,
    event_bus: Arc<EventBus>,
    revalidate_after: Duration,
}

impl AssistantCache {
    pub fn new(store: Arc<dyn AssistantStore>, builder: Arc<dyn RuntimeBuilder>, event_bus: Arc<EventBus>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            store,
            builder,
            event_bus,
            revalidate_after: Duration::ZERO,
        }
    }

    /// Trust an instance for `window` after its last revalidation. Zero
    /// (the default) revalidates on every lookup.
    pub fn with_revalidate_after(mut self, window: Duration) -> Self {
        self.revalidate_after = window;
        self
    }

    async fn slot(&self, key: &CacheKey) -> Slot {
        self.slots.lock().await.entry(key.clone()).or_default().clone()
    }

    /// Remove an empty slot nobody else is waiting on and no live runtime
    /// still takes turns under.
    async fn forget_if_unused(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots.lock().await;
        // One reference from the map, one from the caller.
        if Arc::strong_count(slot) == 2 && Arc::strong_count(&slot.turn_lock) == 1 {
            slots.remove(key);
        }
    }

    fn stale(&self, cached: &CachedInstance, reason: ConfigurationError) -> CacheLookup {
        CacheLookup {
            runtime: cached.runtime.clone(),
            outcome: LookupOutcome::Stale(reason),
        }
    }

    pub async fn get_or_build(
        &self,
        assistant_id: &AssistantId,
        user_id: &UserId,
    ) -> Result<CacheLookup, ConfigurationError> {
        let key = (assistant_id.clone(), user_id.clone());
        let slot = self.slot(&key).await;
        let mut entry = slot.instance.lock().await;

        if let Some(cached) = entry.as_ref()
            && cached.checked_at.elapsed() < self.revalidate_after
        {
            debug!(assistant_id = %assistant_id, user_id = %user_id, "Instance checked recently, reusing");
            return Ok(CacheLookup {
                runtime: cached.runtime.clone(),
                outcome: LookupOutcome::Reused,
            });
        }

        let config = match self.store.get_assistant(assistant_id).await {
            Ok(config) => config,
            Err(e) => {
                let Some(cached) = entry.as_ref() else {
                    self.forget_if_unused(&key, &slot).await;
                    return Err(e);
                };
                warn!(assistant_id = %assistant_id, error = %e, "Revalidation failed, serving cached instance");
                return Ok(self.stale(cached, e));
            }
        };

        let remote = match config.updated_at.to_utc(assistant_id) {
            Ok(ts) => ts,
            Err(e) => {
                error!(
                    assistant_id = %assistant_id,
                    updated_at = %config.updated_at,
                    error = %e,
                    "Remote configuration defect"
                );
                self.event_bus.publish(DomainEvent::ConfigurationDefect {
                    assistant_id: assistant_id.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return match entry.as_ref() {
                    Some(cached) => Ok(self.stale(cached, e)),
                    None => {
                        self.forget_if_unused(&key, &slot).await;
                        Err(e)
                    }
                };
            }
        };

        if let Some(cached) = entry.as_mut() {
            cached.checked_at = Instant::now();
            if remote <= cached.loaded_at {
                return Ok(CacheLookup {
                    runtime: cached.runtime.clone(),
                    outcome: LookupOutcome::Reused,
                });
            }
            info!(
                assistant_id = %assistant_id,
                user_id = %user_id,
                loaded_at = %cached.loaded_at,
                updated_at = %remote,
                "Remote configuration changed, rebuilding"
            );
        }

        let built_at = Utc::now();
        let runtime = match self.builder.build(&config, user_id).await {
            Ok(runtime) => Arc::new(runtime.with_turn_lock(slot.turn_lock.clone())),
            Err(e) => {
                let Some(cached) = entry.as_ref() else {
                    self.forget_if_unused(&key, &slot).await;
                    return Err(e);
                };
                warn!(assistant_id = %assistant_id, error = %e, "Rebuild failed, serving cached instance");
                return Ok(self.stale(cached, e));
            }
        };

        let outcome = if entry.is_some() {
            self.event_bus.publish(DomainEvent::InstanceRebuilt {
                assistant_id: assistant_id.to_string(),
                user_id: user_id.to_string(),
                timestamp: Utc::now(),
            });
            LookupOutcome::Rebuilt
        } else {
            self.event_bus.publish(DomainEvent::InstanceBuilt {
                assistant_id: assistant_id.to_string(),
                user_id: user_id.to_string(),
                timestamp: Utc::now(),
            });
            LookupOutcome::Built
        };

        *entry = Some(CachedInstance {
            runtime: runtime.clone(),
            loaded_at: built_at.max(remote),
            checked_at: Instant::now(),
        });
        Ok(CacheLookup { runtime, outcome })
    }

    /// Drop the instance for `key`; the next lookup rebuilds it.
    pub async fn invalidate(&self, assistant_id: &AssistantId, user_id: &UserId) {
        let key = (assistant_id.clone(), user_id.clone());
        let slot = self.slots.lock().await.get(&key).cloned();
        if let Some(slot) = slot {
            slot.instance.lock().await.take();
            self.forget_if_unused(&key, &slot).await;
        }
    }

    /// Number of keys tracked, built or not.
    #[cfg(test)]
    async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Number of built instances.
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.instance.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// When the instance for `key` was loaded, if cached.
    pub async fn loaded_at(&self, assistant_id: &AssistantId, user_id: &UserId) -> Option<DateTime<Utc>> {
        let slot = self
            .slots
            .lock()
            .await
            .get(&(assistant_id.clone(), user_id.clone()))
            .cloned()?;
        let entry = slot.instance.lock().await;
        entry.as_ref().map(|cached| cached.loaded_at)
    }
}
