//! Graph nodes.
//!
//! A node reads the turn state plus the instance context and returns a
//! `StateUpdate`; the graph applies it. Nodes touch the shared
//! `PromptContextCache` only after the external call feeding it returned.

use async_trait::async_trait;
use chrono::Utc;
use secretary_core::error::Error;
use secretary_core::event::{DomainEvent, EventBus};
use secretary_core::ids::AssistantId;
use secretary_core::message::Message;
use secretary_core::provider::{Provider, ProviderRequest};
use secretary_core::services::FactStore;
use secretary_core::tool::{ToolCall, ToolRegistry};
use secretary_tools::{FACT_SAVED_MESSAGE, SAVE_FACT_TOOL_NAME};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use super::state::{ConversationState, StateUpdate};
use crate::context::{Compactor, SharedContextCache};
use crate::retry::{RetryPolicy, retry};

/// What every node may use besides the turn state. One per instance.
#[derive(Clone)]
pub struct NodeContext {
    pub assistant_id: AssistantId,
    pub instructions: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub cache: SharedContextCache,
    pub facts: Arc<dyn FactStore>,
    pub compactor: Arc<Compactor>,
    pub retry: RetryPolicy,
    pub event_bus: Arc<EventBus>,
}

#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &ConversationState, ctx: &NodeContext) -> Result<StateUpdate, Error>;
}

/// Render the system context: instructions, clock, summary, facts and the
/// triggering event.
pub async fn build_system_context(state: &ConversationState, ctx: &NodeContext) -> Message {
    let cache = ctx.cache.read().await;
    let mut text = ctx.instructions.trim().to_string();

    let _ = write!(
        text,
        "\n\nCurrent date and time: {} (UTC)",
        Utc::now().format("%Y-%m-%d %H:%M, %A")
    );

    if let Some(summary) = cache.summary() {
        let _ = write!(text, "\n\n## Conversation summary\n{summary}");
    }

    if !cache.facts().is_empty() {
        text.push_str("\n\n## Known facts about the user\n");
        for fact in cache.facts() {
            let _ = writeln!(text, "- {fact}");
        }
    }

    if let Some(event) = state.triggered_event() {
        let _ = write!(
            text,
            "\n\n## Triggered event\nType: {}\nPayload: {}\nTell the user about this event.",
            event.trigger_type, event.payload
        );
    }

    Message::system(text.trim_end())
}

/// Run the summary refresh and re-render the context if it changed.
async fn refresh_summary(
    state: &ConversationState,
    ctx: &NodeContext,
    system: Message,
) -> Result<Message, Error> {
    let Some(report) = ctx
        .compactor
        .refresh(&ctx.cache, &system, state.messages())
        .await?
    else {
        return Ok(system);
    };

    let system = build_system_context(state, ctx).await;
    let window = &state.messages()[report.summarized_through.min(state.messages().len())..];
    ctx.event_bus.publish(DomainEvent::ContextCompacted {
        summarized_through: report.summarized_through,
        estimated_tokens: ctx.compactor.input_tokens(&system, window),
        timestamp: Utc::now(),
    });
    Ok(system)
}

/// Consumes the previous turn's fact flag.
pub struct FactCheckNode;

#[async_trait]
impl Node for FactCheckNode {
    fn name(&self) -> &'static str {
        "fact_check"
    }

    async fn run(&self, state: &ConversationState, ctx: &NodeContext) -> Result<StateUpdate, Error> {
        if !state.fact_added_in_last_run {
            return Ok(StateUpdate::none());
        }
        ctx.cache.write().await.require_fact_refresh();
        debug!(user_id = %state.user_id(), "Fact saved last turn, facts marked stale");
        Ok(StateUpdate::fact_flag(false))
    }
}

/// Refreshes stale facts and summary, then renders the system context.
pub struct ContextInjectionNode;

#[async_trait]
impl Node for ContextInjectionNode {
    fn name(&self) -> &'static str {
        "context_injection"
    }

    async fn run(&self, state: &ConversationState, ctx: &NodeContext) -> Result<StateUpdate, Error> {
        if ctx.cache.read().await.needs_fact_refresh() {
            match retry(&ctx.retry, "list_facts", || ctx.facts.list_facts(state.user_id())).await {
                Ok(facts) => {
                    debug!(count = facts.len(), "Facts refreshed");
                    ctx.cache.write().await.update_facts(facts);
                }
                Err(e) => warn!(user_id = %state.user_id(), error = %e, "Fact refresh failed, using cached facts"),
            }
        }

        let mut system = build_system_context(state, ctx).await;
        if ctx.cache.read().await.needs_summary_refresh() {
            system = refresh_summary(state, ctx, system).await?;
        }
        Ok(StateUpdate::context(system))
    }
}

/// Sends the window to the model and appends its reply.
pub struct ModelCallNode;

#[async_trait]
impl Node for ModelCallNode {
    fn name(&self) -> &'static str {
        "model_call"
    }

    async fn run(&self, state: &ConversationState, ctx: &NodeContext) -> Result<StateUpdate, Error> {
        let mut system = match &state.system_context {
            Some(system) => system.clone(),
            None => build_system_context(state, ctx).await,
        };
        let original = system.id.clone();

        let from = ctx.cache.read().await.summarized_through().min(state.messages().len());
        if ctx.compactor.over_budget(&system, &state.messages()[from..]) {
            ctx.cache.write().await.require_summary_refresh();
            system = refresh_summary(state, ctx, system).await?;
        }

        let from = ctx.cache.read().await.summarized_through().min(state.messages().len());
        let window = &state.messages()[from..];
        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(system.clone());
        messages.extend_from_slice(window);

        let request = ProviderRequest {
            model: ctx.model.clone(),
            messages,
            temperature: ctx.temperature,
            max_tokens: ctx.max_tokens,
            tools: ctx.tools.definitions(),
            parallel_tool_calls: false,
        };

        debug!(
            assistant_id = %ctx.assistant_id,
            window = window.len(),
            summarized_through = from,
            "Calling model"
        );
        let response = retry(&ctx.retry, "model_call", || ctx.provider.complete(request.clone())).await?;
        debug!(
            tool_calls = response.message.tool_calls.len(),
            "Model replied"
        );

        Ok(StateUpdate {
            append: vec![response.message],
            system_context: (system.id != original).then_some(system),
            model_calls: 1,
            ..StateUpdate::none()
        })
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Executes the pending tool calls in order. Failures become tool results.
pub struct ToolDispatchNode;

#[async_trait]
impl Node for ToolDispatchNode {
    fn name(&self) -> &'static str {
        "tool_dispatch"
    }

    async fn run(&self, state: &ConversationState, ctx: &NodeContext) -> Result<StateUpdate, Error> {
        let calls = state.pending_tool_calls();
        if calls.is_empty() {
            return Err(Error::Validation("tool dispatch reached without a pending tool call".into()));
        }

        let mut append = Vec::with_capacity(calls.len());
        for raw in calls {
            let started = Instant::now();
            let outcome = match ToolCall::parse(raw) {
                Ok(call) => retry(&ctx.retry, &raw.name, || ctx.tools.execute(&call)).await,
                Err(e) => Err(e),
            };
            let duration_ms = millis(started.elapsed());

            let (success, content) = match outcome {
                Ok(result) => {
                    debug!(tool = %raw.name, duration_ms, "Tool executed");
                    (result.success, result.output)
                }
                Err(e) => {
                    warn!(tool = %raw.name, error = %e, "Tool call failed");
                    (false, format!("Error: {e}"))
                }
            };

            ctx.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: raw.name.clone(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
            append.push(Message::tool_result(&raw.id, &raw.name, content));
        }

        Ok(StateUpdate {
            tool_calls: append.len() as u32,
            tool_rounds: 1,
            append,
            ..StateUpdate::none()
        })
    }
}

/// Sets the fact flag from the last dispatch's results.
pub struct PostToolUpdateNode;

/// Exact match on both tool name and success text.
pub fn is_fact_saved(result: &Message) -> bool {
    result.is_tool_result()
        && result.tool_name.as_deref() == Some(SAVE_FACT_TOOL_NAME)
        && result.content == FACT_SAVED_MESSAGE
}

#[async_trait]
impl Node for PostToolUpdateNode {
    fn name(&self) -> &'static str {
        "post_tool_update"
    }

    async fn run(&self, state: &ConversationState, _ctx: &NodeContext) -> Result<StateUpdate, Error> {
        let saved = state.trailing_tool_results().iter().any(is_fact_saved);
        if saved {
            debug!(user_id = %state.user_id(), "User fact saved");
        }
        Ok(StateUpdate::fact_flag(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PromptContextCache;
    use crate::test_helpers::{FailingFactStore, ScriptedProvider, node_context, tool_call};
    use secretary_core::error::ToolError;
    use secretary_core::ids::UserId;
    use secretary_core::message::Role;
    use secretary_core::tool::{Tool, ToolResult};
    use secretary_core::transport::TriggerEvent;
    use secretary_memory::InMemoryFactStore;

    fn state(messages: Vec<Message>) -> ConversationState {
        ConversationState::new(UserId::new("u1"), messages, None).unwrap()
    }

    #[test]
    fn tool_duration_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn fact_check_is_noop_without_flag() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        ctx.cache.write().await.update_facts(vec![]);

        let update = FactCheckNode.run(&state(vec![Message::user("hi")]), &ctx).await.unwrap();
        assert!(update.fact_added_in_last_run.is_none());
        assert!(!ctx.cache.read().await.needs_fact_refresh());
    }

    #[tokio::test]
    async fn fact_check_is_idempotent() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        ctx.cache.write().await.update_facts(vec!["Любит чай".into()]);
        let mut s = state(vec![Message::user("hi")]);
        s.fact_added_in_last_run = true;

        for _ in 0..2 {
            let update = FactCheckNode.run(&s, &ctx).await.unwrap();
            s.apply(update);
            assert!(!s.fact_added_in_last_run);
            assert!(ctx.cache.read().await.needs_fact_refresh());
        }
        assert_eq!(ctx.cache.read().await.facts(), ["Любит чай"]);
    }

    #[tokio::test]
    async fn context_injection_renders_facts_and_trigger() {
        let facts: Arc<dyn FactStore> = Arc::new(InMemoryFactStore::new());
        facts.add_fact(&UserId::new("u1"), "Есть собака Бобик").await.unwrap();
        let mut ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        ctx.facts = facts;

        let trigger = TriggerEvent {
            trigger_type: "reminder".into(),
            payload: serde_json::json!({"text": "Покормить Бобика"}),
        };
        let s = ConversationState::new(UserId::new("u1"), vec![], Some(trigger)).unwrap();
        let update = ContextInjectionNode.run(&s, &ctx).await.unwrap();

        let system = update.system_context.unwrap();
        assert_eq!(system.role, Role::System);
        assert!(system.content.starts_with("You are a test secretary."));
        assert!(system.content.contains("- Есть собака Бобик"));
        assert!(system.content.contains("Type: reminder"));
        let cache = ctx.cache.read().await;
        assert!(!cache.needs_fact_refresh());
        assert!(!cache.needs_summary_refresh());
    }

    #[tokio::test]
    async fn fact_refresh_failure_keeps_stale_value() {
        let mut ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        ctx.facts = Arc::new(FailingFactStore);
        {
            let mut cache = ctx.cache.write().await;
            cache.update_facts(vec!["Старый факт".into()]);
            cache.require_fact_refresh();
        }

        let update = ContextInjectionNode.run(&state(vec![Message::user("hi")]), &ctx).await.unwrap();
        assert!(update.system_context.unwrap().content.contains("Старый факт"));
        assert!(ctx.cache.read().await.needs_fact_refresh());
    }

    #[tokio::test]
    async fn model_call_sends_system_context_and_tools() {
        let provider = Arc::new(ScriptedProvider::texts(&["Привет!"]));
        let ctx = node_context(provider.clone());
        let mut s = state(vec![Message::user("Привет")]);
        s.system_context = Some(Message::system("ctx"));

        let update = ModelCallNode.run(&s, &ctx).await.unwrap();
        assert_eq!(update.append[0].content, "Привет!");
        assert_eq!(update.model_calls, 1);
        assert!(update.system_context.is_none());

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages[0].content, "ctx");
        assert_eq!(request.messages[1].content, "Привет");
        assert!(!request.parallel_tool_calls);
        assert!(request.tools.iter().any(|t| t.name == "echo"));
    }

    #[tokio::test]
    async fn model_call_skips_summarized_entries() {
        let provider = Arc::new(ScriptedProvider::texts(&["ok"]));
        let ctx = node_context(provider.clone());
        ctx.cache
            .write()
            .await
            .update_summary(Some("Раньше обсуждали отпуск".into()), 2);
        let s = state(vec![
            Message::user("old 1"),
            Message::assistant("old 2"),
            Message::user("new"),
        ]);

        ModelCallNode.run(&s, &ctx).await.unwrap();
        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("Раньше обсуждали отпуск"));
        assert_eq!(request.messages[1].content, "new");
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::texts(&[]));
        let ctx = node_context(provider);
        let err = ModelCallNode
            .run(&state(vec![Message::user("hi")]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn dispatch_runs_calls_in_order() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        let s = state(vec![
            Message::user("hi"),
            Message::assistant_tool_calls(
                "",
                vec![
                    tool_call("c1", "echo", r#"{"text":"one"}"#),
                    tool_call("c2", "echo", r#"{"text":"two"}"#),
                ],
            ),
        ]);

        let update = ToolDispatchNode.run(&s, &ctx).await.unwrap();
        assert_eq!(update.tool_calls, 2);
        assert_eq!(update.tool_rounds, 1);
        let ids: Vec<_> = update.append.iter().map(|m| m.tool_call_id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert_eq!(update.append[1].content, "two");
        assert_eq!(update.append[1].tool_name.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn dispatch_surfaces_errors_as_results() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        let mut events = ctx.event_bus.subscribe();
        let s = state(vec![
            Message::user("hi"),
            Message::assistant_tool_calls(
                "",
                vec![
                    tool_call("c1", "no_such_tool", "{}"),
                    tool_call("c2", "echo", "not json"),
                    tool_call("c3", "echo", "{}"),
                ],
            ),
        ]);

        let update = ToolDispatchNode.run(&s, &ctx).await.unwrap();
        assert_eq!(update.append.len(), 3);
        for result in &update.append {
            assert!(result.content.starts_with("Error: "), "{}", result.content);
        }
        assert!(update.append[0].content.contains("not found"));
        assert!(update.append[2].content.contains("text"));

        let first = events.recv().await.unwrap();
        assert!(matches!(&*first, DomainEvent::ToolExecuted { success: false, .. }));
    }

    #[tokio::test]
    async fn dispatch_without_pending_call_is_invalid() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        let err = ToolDispatchNode
            .run(&state(vec![Message::user("hi")]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    struct FlakyTool {
        failures: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "Fails once"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            if self.failures.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                return Err(ToolError::Unavailable {
                    tool_name: "flaky".into(),
                    reason: "503".into(),
                });
            }
            Ok(ToolResult::ok("recovered"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_retries_transient_tool_errors() {
        let mut ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FlakyTool {
            failures: Default::default(),
        }));
        ctx.tools = Arc::new(registry);
        ctx.retry = RetryPolicy::default();

        let s = state(vec![
            Message::user("hi"),
            Message::assistant_tool_calls("", vec![tool_call("c1", "flaky", "{}")]),
        ]);
        let update = ToolDispatchNode.run(&s, &ctx).await.unwrap();
        assert_eq!(update.append[0].content, "recovered");
    }

    #[test]
    fn fact_saved_requires_exact_match() {
        assert!(is_fact_saved(&Message::tool_result("c", SAVE_FACT_TOOL_NAME, FACT_SAVED_MESSAGE)));
        assert!(!is_fact_saved(&Message::tool_result("c", SAVE_FACT_TOOL_NAME, "Факт успешно добавлен")));
        assert!(!is_fact_saved(&Message::tool_result("c", SAVE_FACT_TOOL_NAME, " Факт успешно добавлен.")));
        assert!(!is_fact_saved(&Message::tool_result("c", "echo", FACT_SAVED_MESSAGE)));
        assert!(!is_fact_saved(&Message::assistant(FACT_SAVED_MESSAGE)));
    }

    #[tokio::test]
    async fn post_tool_update_reads_last_run_only() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        let s = state(vec![
            Message::user("Запомни, что я люблю чай"),
            Message::assistant_tool_calls("", vec![tool_call("c1", SAVE_FACT_TOOL_NAME, "{}")]),
            Message::tool_result("c1", SAVE_FACT_TOOL_NAME, FACT_SAVED_MESSAGE),
        ]);
        let update = PostToolUpdateNode.run(&s, &ctx).await.unwrap();
        assert_eq!(update.fact_added_in_last_run, Some(true));

        let mut later = s.clone();
        later.apply(StateUpdate {
            append: vec![
                Message::assistant_tool_calls("", vec![tool_call("c2", "echo", "{}")]),
                Message::tool_result("c2", "echo", "x"),
            ],
            ..StateUpdate::none()
        });
        let update = PostToolUpdateNode.run(&later, &ctx).await.unwrap();
        assert_eq!(update.fact_added_in_last_run, Some(false));
    }

    #[tokio::test]
    async fn fresh_cache_context_has_no_summary_section() {
        let ctx = node_context(Arc::new(ScriptedProvider::texts(&[])));
        *ctx.cache.write().await = PromptContextCache::new();
        let system = build_system_context(&state(vec![Message::user("hi")]), &ctx).await;
        assert!(!system.content.contains("## Conversation summary"));
        assert!(!system.content.contains("## Known facts"));
    }
}
