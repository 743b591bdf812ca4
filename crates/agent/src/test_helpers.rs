//! Shared stand-ins for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secretary_core::error::{ProviderError, ServiceError, ToolError};
use secretary_core::event::EventBus;
use secretary_core::ids::{AssistantId, UserId};
use secretary_core::message::{Message, MessageToolCall};
use secretary_core::provider::{Provider, ProviderRequest, ProviderResponse};
use secretary_core::services::{
    CalendarEvent, CalendarService, FactStore, NewCalendarEvent, Reminder, ReminderService,
};
use secretary_core::tool::{Tool, ToolRegistry, ToolResult};
use secretary_memory::InMemoryFactStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use crate::context::{
    CompactionSettings, Compactor, HeuristicEstimator, PromptContextCache, Summarizer, TokenEstimator,
};
use crate::graph::nodes::NodeContext;
use crate::retry::RetryPolicy;

/// Replays a fixed list of replies and records every request.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Message, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Self::text(r)).collect())
    }

    pub fn text(reply: &str) -> Result<Message, ProviderError> {
        Ok(Message::assistant(reply))
    }

    pub fn call(id: &str, name: &str, arguments: &str) -> Result<Message, ProviderError> {
        Ok(Message::assistant_tool_calls("", vec![tool_call(id, name, arguments)]))
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let message = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))?;
        Ok(ProviderResponse {
            message,
            usage: None,
            model,
        })
    }
}

pub fn tool_call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

/// Returns "summary of N" and records `(previous, N)` per call.
#[derive(Default)]
pub struct RecordingSummarizer {
    pub calls: Mutex<Vec<(Option<String>, usize)>>,
    fail: bool,
}

impl RecordingSummarizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, previous: Option<&str>, messages: &[Message]) -> Result<String, ProviderError> {
        if self.fail {
            return Err(ProviderError::AuthenticationFailed("summarizer down".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((previous.map(String::from), messages.len()));
        Ok(format!("summary of {}", messages.len()))
    }
}

/// Every message costs the same, which keeps compaction arithmetic obvious.
pub struct FlatEstimator(pub usize);

impl TokenEstimator for FlatEstimator {
    fn estimate_message(&self, _message: &Message) -> usize {
        self.0
    }
}

pub struct FailingFactStore;

#[async_trait]
impl FactStore for FailingFactStore {
    async fn add_fact(&self, _user_id: &UserId, _fact: &str) -> Result<(), ServiceError> {
        Err(ServiceError::Http {
            status: 400,
            message: "rejected".into(),
        })
    }

    async fn list_facts(&self, _user_id: &UserId) -> Result<Vec<String>, ServiceError> {
        Err(ServiceError::Http {
            status: 400,
            message: "rejected".into(),
        })
    }
}

/// Echoes its required `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Repeat the given text"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(arguments["text"].as_str().unwrap_or_default()))
    }
}

/// A node context with an echo tool, in-memory facts, no retries and a
/// budget large enough that compaction never runs.
pub fn node_context(provider: Arc<dyn Provider>) -> NodeContext {
    let mut tools = ToolRegistry::new();
    tools.register(Box::new(EchoTool));

    NodeContext {
        assistant_id: AssistantId::new("a1"),
        instructions: "You are a test secretary.".into(),
        model: "test-model".into(),
        temperature: 0.7,
        max_tokens: None,
        provider,
        tools: Arc::new(tools),
        cache: PromptContextCache::shared(),
        facts: Arc::new(InMemoryFactStore::new()),
        compactor: Arc::new(Compactor::new(
            CompactionSettings {
                max_input_tokens: 100_000,
                keep_recent_tokens: 50_000,
            },
            Arc::new(HeuristicEstimator),
            Arc::new(RecordingSummarizer::default()),
        )),
        retry: RetryPolicy::none(),
        event_bus: Arc::new(EventBus::default()),
    }
}

/// Calendar with no events.
pub struct NoCalendar;

#[async_trait]
impl CalendarService for NoCalendar {
    async fn list_events(
        &self,
        _user_id: &UserId,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        Ok(Vec::new())
    }

    async fn create_event(
        &self,
        _user_id: &UserId,
        _event: NewCalendarEvent,
    ) -> Result<CalendarEvent, ServiceError> {
        Err(ServiceError::Http {
            status: 503,
            message: "calendar disabled".into(),
        })
    }
}

/// Reminder service that stores nothing.
pub struct NoReminders;

#[async_trait]
impl ReminderService for NoReminders {
    async fn create_reminder(
        &self,
        _user_id: &UserId,
        _text: &str,
        _remind_at: DateTime<Utc>,
    ) -> Result<Reminder, ServiceError> {
        Err(ServiceError::Http {
            status: 503,
            message: "reminders disabled".into(),
        })
    }

    async fn list_reminders(&self, _user_id: &UserId) -> Result<Vec<Reminder>, ServiceError> {
        Ok(Vec::new())
    }

    async fn delete_reminder(&self, _user_id: &UserId, _reminder_id: &str) -> Result<bool, ServiceError> {
        Ok(false)
    }
}
