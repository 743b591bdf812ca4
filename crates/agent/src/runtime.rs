//! Assistant runtimes: one graph plus bound tools and context cache per
//! (assistant, user) pair.

use async_trait::async_trait;
use chrono::Utc;
use secretary_config::AppConfig;
use secretary_core::assistant::{AssistantConfig, AssistantStore};
use secretary_core::error::{ConfigurationError, Error};
use secretary_core::event::EventBus;
use secretary_core::history::{ThreadId, ThreadStore};
use secretary_core::ids::{AssistantId, UserId};
use secretary_core::message::Message;
use secretary_core::provider::Provider;
use secretary_core::tool::ToolRegistry;
use secretary_core::transport::{InboundEvent, TriggerEvent};
use secretary_tools::ToolResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use crate::context::{
    CompactionSettings, Compactor, HeuristicEstimator, LlmSummarizer, PromptContextCache,
    SharedContextCache, Summarizer, TokenEstimator,
};
use crate::graph::nodes::NodeContext;
use crate::graph::state::{ConversationState, trigger_entry};
use crate::graph::{ConversationGraph, GraphRun};
use crate::retry::RetryPolicy;
use crate::subagent::{SUB_ASSISTANT_PREFIX, SubAgentTool};

/// Orchestration knobs derived from `AppConfig` once at startup.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub default_model: String,
    pub summary_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub compaction: CompactionSettings,
    pub retry: RetryPolicy,
    pub max_tool_iterations: u32,
    /// Skip remote revalidation of a cached instance checked this recently
    pub revalidate_after: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_model: config.provider.default_model.clone(),
            summary_model: config.provider.summary_model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            compaction: CompactionSettings::from(&config.compaction),
            retry: RetryPolicy::from(&config.retry),
            max_tool_iterations: config.agent.max_tool_iterations,
            revalidate_after: Duration::from_secs(config.cache.revalidate_after_secs),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What starts a turn.
#[derive(Debug, Clone)]
pub enum TurnInput {
    Message {
        content: String,
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    Trigger(TriggerEvent),
}

impl TurnInput {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

impl From<InboundEvent> for TurnInput {
    fn from(event: InboundEvent) -> Self {
        match event {
            InboundEvent::UserMessage { content, metadata, .. } => Self::Message { content, metadata },
            InboundEvent::Trigger {
                trigger_type,
                payload,
                ..
            } => Self::Trigger(TriggerEvent {
                trigger_type,
                payload,
            }),
        }
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub reply: String,
    pub model_calls: u32,
    pub tool_calls: u32,
}

/// Serializes turns on one thread. Shared by every runtime built for the
/// same (assistant, user) key, so a rebuild never lets two turns interleave.
pub type TurnLock = Arc<Mutex<()>>;

/// A built assistant bound to one user. Immutable once built; turns for
/// the same thread run one at a time.
pub struct AssistantRuntime {
    config: AssistantConfig,
    user_id: UserId,
    thread: ThreadId,
    graph: ConversationGraph,
    context: NodeContext,
    history: Arc<dyn ThreadStore>,
    turn_lock: TurnLock,
}

impl std::fmt::Debug for AssistantRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantRuntime")
            .field("assistant_id", &self.config.id)
            .field("user_id", &self.user_id)
            .field("tools", &self.context.tools.names())
            .finish()
    }
}

impl AssistantRuntime {
    pub fn new(
        config: AssistantConfig,
        user_id: UserId,
        graph: ConversationGraph,
        context: NodeContext,
        history: Arc<dyn ThreadStore>,
    ) -> Self {
        Self {
            thread: ThreadId::for_pair(&config.id, &user_id),
            config,
            user_id,
            graph,
            context,
            history,
            turn_lock: TurnLock::default(),
        }
    }

    /// Take turns under `lock` instead of this runtime's own.
    pub fn with_turn_lock(mut self, lock: TurnLock) -> Self {
        self.turn_lock = lock;
        self
    }

    pub fn turn_lock(&self) -> &TurnLock {
        &self.turn_lock
    }

    pub fn assistant_id(&self) -> &AssistantId {
        &self.config.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn thread(&self) -> &ThreadId {
        &self.thread
    }

    pub fn cache(&self) -> &SharedContextCache {
        &self.context.cache
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.context.tools.names()
    }

    /// Run one turn against the persisted thread and append its entries.
    ///
    /// A failed turn persists only the inbound entry.
    pub async fn run_turn(&self, input: TurnInput) -> Result<TurnReport, Error> {
        let _turn = self.turn_lock.lock().await;

        let (inbound, trigger) = match input {
            TurnInput::Message { content, metadata } => {
                if content.trim().is_empty() {
                    return Err(Error::Validation("empty message".into()));
                }
                let mut message = Message::user(content);
                message.metadata = metadata;
                (message, None)
            }
            TurnInput::Trigger(event) => (trigger_entry(&event), Some(event)),
        };

        let thread = self.history.load(&self.thread).await?;
        let mut state = ConversationState::from_thread(self.user_id.clone(), thread, inbound, trigger)?;
        info!(
            assistant_id = %self.config.id,
            user_id = %self.user_id,
            history = state.persisted_len(),
            triggered = state.triggered_event().is_some(),
            "Turn started"
        );

        let snapshot = {
            let mut cache = self.context.cache.write().await;
            if cache.rebase(state.persisted_len()) {
                warn!(thread = %self.thread, "Summary covered entries missing from history, dropped");
            }
            cache.summary_snapshot()
        };

        match self.graph.run(&mut state, &self.context).await {
            Ok(GraphRun { reply, steps }) => {
                if let Err(e) = self
                    .history
                    .append(&self.thread, state.new_entries(), state.fact_flag_for_next_turn())
                    .await
                {
                    self.context.cache.write().await.restore_summary(snapshot);
                    return Err(e.into());
                }
                debug!(steps = steps.len(), "Turn finished");
                Ok(TurnReport {
                    reply,
                    model_calls: state.model_calls,
                    tool_calls: state.tool_calls,
                })
            }
            Err(e) => {
                // Compaction during the turn may have folded entries that are not persisted.
                self.context.cache.write().await.restore_summary(snapshot);
                let inbound = &state.new_entries()[..1];
                if let Err(persist) = self
                    .history
                    .append(&self.thread, inbound, state.fact_flag_for_next_turn())
                    .await
                {
                    warn!(thread = %self.thread, error = %persist, "Failed to persist inbound entry of failed turn");
                }
                Err(e)
            }
        }
    }

    /// Run a single task with no history, nothing persisted.
    ///
    /// The task gets its own summary state; only known facts carry over.
    pub async fn run_oneshot(&self, task: &str) -> Result<String, Error> {
        let _turn = self.turn_lock.lock().await;
        let mut state = ConversationState::new(self.user_id.clone(), vec![Message::user(task)], None)?;

        let mut cache = PromptContextCache::new();
        {
            let shared = self.context.cache.read().await;
            if !shared.needs_fact_refresh() {
                cache.update_facts(shared.facts().to_vec());
            }
        }
        let context = NodeContext {
            cache: Arc::new(RwLock::new(cache)),
            ..self.context.clone()
        };

        let run = self.graph.run(&mut state, &context).await?;
        Ok(run.reply)
    }
}

/// Builds runtimes from remote assistant configuration.
#[async_trait]
pub trait RuntimeBuilder: Send + Sync {
    async fn build(&self, config: &AssistantConfig, user_id: &UserId) -> Result<AssistantRuntime, ConfigurationError>;
}

/// Wires the shared provider, tools and stores into each runtime.
pub struct DefaultRuntimeBuilder {
    provider: Arc<dyn Provider>,
    resolver: ToolResolver,
    store: Arc<dyn AssistantStore>,
    history: Arc<dyn ThreadStore>,
    settings: OrchestratorSettings,
    event_bus: Arc<EventBus>,
    estimator: Arc<dyn TokenEstimator>,
    summarizer: Arc<dyn Summarizer>,
}

impl DefaultRuntimeBuilder {
    pub fn new(
        provider: Arc<dyn Provider>,
        resolver: ToolResolver,
        store: Arc<dyn AssistantStore>,
        history: Arc<dyn ThreadStore>,
        settings: OrchestratorSettings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let summary_model = settings
            .summary_model
            .clone()
            .unwrap_or_else(|| settings.default_model.clone());
        let summarizer = Arc::new(LlmSummarizer::new(
            provider.clone(),
            summary_model,
            settings.retry.clone(),
        ));
        Self {
            provider,
            resolver,
            store,
            history,
            settings,
            event_bus,
            estimator: Arc::new(HeuristicEstimator),
            summarizer,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Resolve plain tool ids. Sub-assistant ids are skipped: a sub-assistant
    /// cannot delegate further.
    fn resolve_tools(&self, config: &AssistantConfig, user_id: &UserId) -> Result<ToolRegistry, ConfigurationError> {
        let mut registry = ToolRegistry::new();
        for tool_id in &config.tool_ids {
            if tool_id.starts_with(SUB_ASSISTANT_PREFIX) {
                warn!(assistant_id = %config.id, tool_id = %tool_id, "Nested sub-assistant ignored");
                continue;
            }
            self.resolver.register(&mut registry, tool_id, user_id)?;
        }
        Ok(registry)
    }

    fn assemble(&self, config: &AssistantConfig, user_id: &UserId, tools: ToolRegistry) -> AssistantRuntime {
        let model = if config.model.trim().is_empty() {
            self.settings.default_model.clone()
        } else {
            config.model.clone()
        };

        let context = NodeContext {
            assistant_id: config.id.clone(),
            instructions: config.instructions.clone(),
            model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            provider: self.provider.clone(),
            tools: Arc::new(tools),
            cache: PromptContextCache::shared(),
            facts: self.resolver.fact_store(),
            compactor: Arc::new(Compactor::new(
                self.settings.compaction,
                self.estimator.clone(),
                self.summarizer.clone(),
            )),
            retry: self.settings.retry.clone(),
            event_bus: self.event_bus.clone(),
        };

        AssistantRuntime::new(
            config.clone(),
            user_id.clone(),
            ConversationGraph::new(self.settings.max_tool_iterations),
            context,
            self.history.clone(),
        )
    }
}

#[async_trait]
impl RuntimeBuilder for DefaultRuntimeBuilder {
    async fn build(&self, config: &AssistantConfig, user_id: &UserId) -> Result<AssistantRuntime, ConfigurationError> {
        let mut registry = ToolRegistry::new();

        for tool_id in &config.tool_ids {
            let Some(sub_id) = tool_id.strip_prefix(SUB_ASSISTANT_PREFIX) else {
                self.resolver.register(&mut registry, tool_id, user_id)?;
                continue;
            };

            let sub_config = self.store.get_assistant(&AssistantId::new(sub_id.trim())).await?;
            let sub_tools = self.resolve_tools(&sub_config, user_id)?;
            let sub_runtime = self.assemble(&sub_config, user_id, sub_tools);
            registry.register(Box::new(SubAgentTool::new(Arc::new(sub_runtime))));
        }

        info!(
            assistant_id = %config.id,
            user_id = %user_id,
            tools = registry.len(),
            built_at = %Utc::now(),
            "Assistant runtime built"
        );
        Ok(self.assemble(config, user_id, registry))
    }
}
