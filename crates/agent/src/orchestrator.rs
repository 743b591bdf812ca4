//! Entry point for inbound events.

use chrono::Utc;
use secretary_core::assistant::AssistantStore;
use secretary_core::error::{Error, ServiceError};
use secretary_core::event::{DomainEvent, EventBus};
use secretary_core::ids::AssistantId;
use secretary_core::transport::{InboundEvent, ResponseSink, TurnFailure};
use std::sync::Arc;
use tracing::{error, info};
use crate::instance_cache::AssistantCache;
use crate::runtime::TurnReport;

/// Resolves the user's assistant, runs the turn, and reports the outcome.
pub struct Orchestrator {
    store: Arc<dyn AssistantStore>,
    cache: Arc<AssistantCache>,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn AssistantStore>, cache: Arc<AssistantCache>, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            cache,
            event_bus,
        }
    }

    pub fn cache(&self) -> &AssistantCache {
        &self.cache
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Handle one inbound event. The reply is returned, never delivered.
    pub async fn handle(&self, event: InboundEvent) -> Result<String, TurnFailure> {
        let user_id = event.user_id().clone();
        let mut assistant_id = None;

        match self.dispatch(event, &mut assistant_id).await {
            Ok(report) => {
                let assistant_id = assistant_id.map(|id| id.to_string()).unwrap_or_default();
                info!(
                    assistant_id = %assistant_id,
                    user_id = %user_id,
                    model_calls = report.model_calls,
                    tool_calls = report.tool_calls,
                    "Turn completed"
                );
                self.event_bus.publish(DomainEvent::TurnCompleted {
                    assistant_id,
                    user_id: user_id.to_string(),
                    model_calls: report.model_calls,
                    tool_calls: report.tool_calls,
                    timestamp: Utc::now(),
                });
                Ok(report.reply)
            }
            Err(e) => {
                let failure = TurnFailure::from_error(&e);
                let assistant_id = assistant_id.map(|id| id.to_string()).unwrap_or_default();
                error!(
                    code = %failure.code,
                    assistant_id = %assistant_id,
                    user_id = %user_id,
                    error = %e,
                    "Turn failed"
                );
                self.event_bus.publish(DomainEvent::TurnFailed {
                    assistant_id,
                    user_id: user_id.to_string(),
                    code: failure.code,
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(failure)
            }
        }
    }

    async fn dispatch(&self, event: InboundEvent, resolved: &mut Option<AssistantId>) -> Result<TurnReport, Error> {
        let user_id = event.user_id().clone();
        let assistant_id = self.store.get_user_secretary(&user_id).await?;
        *resolved = Some(assistant_id.clone());

        let lookup = self.cache.get_or_build(&assistant_id, &user_id).await?;
        lookup.runtime.run_turn(event.into()).await
    }

    /// Handle an event and hand the reply, or the apology on failure, to `sink`.
    pub async fn handle_and_deliver(&self, event: InboundEvent, sink: &dyn ResponseSink) -> Result<(), ServiceError> {
        let user_id = event.user_id().clone();
        let text = match self.handle(event).await {
            Ok(reply) => reply,
            Err(failure) => failure.message,
        };
        sink.deliver(&user_id, &text).await
    }
}
