//! Delegating a task to another assistant.
//!
//! A tool id `sub_assistant:<assistant_id>` exposes that assistant as a
//! tool. Calling it runs one history-less graph pass of the sub-assistant
//! with its own instructions and tools, and returns its reply.

use async_trait::async_trait;
use secretary_core::error::{Error, ToolError};
use secretary_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use tracing::info;
use crate::runtime::AssistantRuntime;

/// Tool id prefix naming a sub-assistant.
pub const SUB_ASSISTANT_PREFIX: &str = "sub_assistant:";

/// Tool names allow only `[a-zA-Z0-9_-]`.
fn tool_name_for(assistant_id: &str) -> String {
    let id: String = assistant_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("sub_assistant_{id}")
}

pub struct SubAgentTool {
    name: String,
    description: String,
    runtime: Arc<AssistantRuntime>,
}

impl SubAgentTool {
    pub fn new(runtime: Arc<AssistantRuntime>) -> Self {
        let config = runtime.config();
        let label = if config.name.trim().is_empty() {
            config.id.to_string()
        } else {
            config.name.clone()
        };
        Self {
            name: tool_name_for(config.id.as_str()),
            description: format!(
                "Delegate a self-contained task to the assistant \"{label}\" and get its answer back. \
                 Describe the task fully; it cannot see this conversation."
            ),
            runtime,
        }
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task for the assistant, with all needed details"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let task = arguments["task"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments(format!("{}: missing 'task' argument", self.name)))?;

        info!(sub_assistant = %self.runtime.assistant_id(), "Delegating task");
        match self.runtime.run_oneshot(task).await {
            Ok(reply) => Ok(ToolResult::ok(reply)),
            Err(Error::Tool(e)) => Err(e),
            Err(e) if e.code() == secretary_core::ErrorCode::RateLimitError => Err(ToolError::Unavailable {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            }),
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConversationGraph;
    use crate::test_helpers::{ScriptedProvider, node_context};
    use chrono::Utc;
    use secretary_core::assistant::{AssistantConfig, RemoteTimestamp};
    use secretary_core::ids::{AssistantId, UserId};
    use secretary_memory::InMemoryThreadStore;

    fn sub_runtime(provider: Arc<ScriptedProvider>) -> Arc<AssistantRuntime> {
        let config = AssistantConfig {
            id: AssistantId::new("travel.planner"),
            name: "Планировщик поездок".into(),
            updated_at: RemoteTimestamp::from(Utc::now()),
            instructions: "Plan trips.".into(),
            model: String::new(),
            tool_ids: vec![],
        };
        Arc::new(AssistantRuntime::new(
            config,
            UserId::new("u1"),
            ConversationGraph::default(),
            node_context(provider),
            Arc::new(InMemoryThreadStore::new()),
        ))
    }

    #[test]
    fn name_is_sanitized() {
        assert_eq!(tool_name_for("travel.planner"), "sub_assistant_travel_planner");
        assert_eq!(tool_name_for("a-1_b"), "sub_assistant_a-1_b");
    }

    #[tokio::test]
    async fn returns_sub_assistant_reply() {
        let provider = Arc::new(ScriptedProvider::texts(&["Поезд в 9:40"]));
        let tool = SubAgentTool::new(sub_runtime(provider.clone()));
        assert!(tool.description().contains("Планировщик поездок"));

        let result = tool
            .execute(serde_json::json!({"task": "Найди поезд в Казань на завтра"}))
            .await
            .unwrap();
        assert_eq!(result.output, "Поезд в 9:40");

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "Найди поезд в Казань на завтра");
    }

    #[tokio::test]
    async fn model_failure_becomes_tool_error() {
        let tool = SubAgentTool::new(sub_runtime(Arc::new(ScriptedProvider::texts(&[]))));
        let err = tool.execute(serde_json::json!({"task": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn blank_task_rejected() {
        let tool = SubAgentTool::new(sub_runtime(Arc::new(ScriptedProvider::texts(&[]))));
        let err = tool.execute(serde_json::json!({"task": "  "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
