//! The conversation state machine.
//!
//! ```text
//! start → fact_check → context_injection → model_call ─┬─► end
//!                                            ▲          │ (tool-call request)
//!                                            │          ▼
//!                                   post_tool_update ◄─ tool_dispatch
//! ```
//!
//! One pass per inbound message or trigger. Every edge is `Step::next`.

pub mod nodes;
pub mod state;

use secretary_core::error::{Error, ToolError};
use tracing::{debug, warn};
use nodes::{
    ContextInjectionNode, FactCheckNode, ModelCallNode, Node, NodeContext, PostToolUpdateNode,
    ToolDispatchNode,
};
use state::ConversationState;

pub use nodes::build_system_context;
pub use state::{StateUpdate, trigger_entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    FactCheck,
    ContextInjection,
    ModelCall,
    ToolDispatch,
    PostToolUpdate,
    End,
}

impl Step {
    /// The transition out of `self` given the state after `self` ran.
    pub fn next(self, state: &ConversationState) -> Step {
        match self {
            Step::Start => Step::FactCheck,
            Step::FactCheck => Step::ContextInjection,
            Step::ContextInjection => Step::ModelCall,
            Step::ModelCall if state.pending_tool_calls().is_empty() => Step::End,
            Step::ModelCall => Step::ToolDispatch,
            Step::ToolDispatch => Step::PostToolUpdate,
            Step::PostToolUpdate => Step::ModelCall,
            Step::End => Step::End,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::FactCheck => "fact_check",
            Step::ContextInjection => "context_injection",
            Step::ModelCall => "model_call",
            Step::ToolDispatch => "tool_dispatch",
            Step::PostToolUpdate => "post_tool_update",
            Step::End => "end",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone)]
pub struct GraphRun {
    pub reply: String,
    /// Every step visited, `Start` through `End`
    pub steps: Vec<Step>,
}

pub struct ConversationGraph {
    max_tool_iterations: u32,
}

impl ConversationGraph {
    pub fn new(max_tool_iterations: u32) -> Self {
        Self {
            max_tool_iterations: max_tool_iterations.max(1),
        }
    }

    fn node(step: Step) -> Option<&'static dyn Node> {
        match step {
            Step::FactCheck => Some(&FactCheckNode),
            Step::ContextInjection => Some(&ContextInjectionNode),
            Step::ModelCall => Some(&ModelCallNode),
            Step::ToolDispatch => Some(&ToolDispatchNode),
            Step::PostToolUpdate => Some(&PostToolUpdateNode),
            Step::Start | Step::End => None,
        }
    }

    /// Drive `state` from `Start` to `End`. Any node error ends the pass.
    pub async fn run(&self, state: &mut ConversationState, ctx: &NodeContext) -> Result<GraphRun, Error> {
        let mut step = Step::Start;
        let mut steps = vec![step];

        loop {
            step = step.next(state);
            steps.push(step);

            if step == Step::ToolDispatch && state.tool_rounds >= self.max_tool_iterations {
                warn!(
                    assistant_id = %ctx.assistant_id,
                    rounds = state.tool_rounds,
                    "Tool round limit reached"
                );
                return Err(ToolError::IterationLimit {
                    limit: self.max_tool_iterations,
                }
                .into());
            }

            let Some(node) = Self::node(step) else {
                break;
            };
            debug!(step = node.name(), "Running node");
            let update = node.run(state, ctx).await?;
            state.apply(update);
        }

        let reply = state
            .final_reply()
            .ok_or_else(|| Error::Internal("graph ended without a model reply".into()))?
            .to_string();
        Ok(GraphRun { reply, steps })
    }
}

impl Default for ConversationGraph {
    fn default() -> Self {
        Self::new(25)
    }
}
