//! The Secretary orchestration runtime.
//!
//! Each inbound message or trigger runs one pass of a small state machine:
//!
//! 1. **Fact check**: a fact saved last turn marks cached facts stale
//! 2. **Context injection**: refresh stale facts and summary, render the
//!    system context
//! 3. **Model call**: send system context plus uncompacted history
//! 4. **Tool dispatch**: run requested tools, append results, back to 3
//! 5. **End**: the model's text reply is the turn's output
//!
//! Runtimes (graph + bound tools + context cache) are cached per
//! (assistant, user) and rebuilt when the remote configuration changes.

pub mod context;
pub mod graph;
pub mod instance_cache;
pub mod orchestrator;
pub mod retry;
pub mod runtime;
pub mod subagent;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{Compactor, HeuristicEstimator, LlmSummarizer, PromptContextCache, Summarizer, TokenEstimator};
pub use graph::state::ConversationState;
pub use graph::{ConversationGraph, GraphRun, Step};
pub use instance_cache::{AssistantCache, CacheLookup, LookupOutcome};
pub use orchestrator::Orchestrator;
pub use retry::RetryPolicy;
pub use runtime::{
    AssistantRuntime, DefaultRuntimeBuilder, OrchestratorSettings, RuntimeBuilder, TurnInput, TurnReport,
};
pub use subagent::SubAgentTool;
