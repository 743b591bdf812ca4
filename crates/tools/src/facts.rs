//! Long-term user facts.
//!
//! The exact success text is load-bearing: the post-tool step compares a
//! tool result against it to decide whether the fact cache must be
//! refreshed on the next turn.

use async_trait::async_trait;
use secretary_core::error::ToolError;
use secretary_core::ids::UserId;
use secretary_core::services::FactStore;
use secretary_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use crate::required_str;

/// Registered name of the fact tool.
pub const SAVE_FACT_TOOL_NAME: &str = "save_user_fact";

/// Output of a successful `save_user_fact` call.
pub const FACT_SAVED_MESSAGE: &str = "Факт успешно добавлен.";

pub struct SaveUserFactTool {
    store: Arc<dyn FactStore>,
    user_id: UserId,
}

impl SaveUserFactTool {
    pub fn new(store: Arc<dyn FactStore>, user_id: UserId) -> Self {
        Self { store, user_id }
    }
}

#[async_trait]
impl Tool for SaveUserFactTool {
    fn name(&self) -> &str {
        SAVE_FACT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Save a durable fact about the user (preferences, relatives, habits) so it can be recalled in later conversations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fact": {
                    "type": "string",
                    "description": "The fact, phrased as a short standalone sentence"
                }
            },
            "required": ["fact"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let fact = required_str(self.name(), &arguments, "fact")?;
        self.store
            .add_fact(&self.user_id, fact)
            .await
            .map_err(|e| ToolError::from_service(SAVE_FACT_TOOL_NAME, e))?;
        tracing::debug!(user = %self.user_id, "User fact saved");
        Ok(ToolResult::ok(FACT_SAVED_MESSAGE))
    }
}
