//! Reminder tools backed by the notification microservice.
//!
//! A fired reminder comes back into the orchestrator as a trigger event;
//! these tools only schedule, list and cancel.

use async_trait::async_trait;
use chrono::Utc;
use secretary_core::error::ToolError;
use secretary_core::ids::UserId;
use secretary_core::services::ReminderService;
use secretary_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use crate::{parse_datetime, required_str};

pub struct CreateReminderTool {
    reminders: Arc<dyn ReminderService>,
    user_id: UserId,
}

impl CreateReminderTool {
    pub fn new(reminders: Arc<dyn ReminderService>, user_id: UserId) -> Self {
        Self { reminders, user_id }
    }
}

#[async_trait]
impl Tool for CreateReminderTool {
    fn name(&self) -> &str {
        "create_reminder"
    }

    fn description(&self) -> &str {
        "Schedule a reminder that will be sent to the user at the given time."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "What to remind about" },
                "remind_at": { "type": "string", "description": "When, RFC 3339 with offset" }
            },
            "required": ["text", "remind_at"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let text = required_str(self.name(), &arguments, "text")?;
        let remind_at = parse_datetime(self.name(), "remind_at", &arguments["remind_at"])?;
        if remind_at <= Utc::now() {
            return Err(ToolError::InvalidArguments(
                "create_reminder: 'remind_at' is in the past".into(),
            ));
        }

        let reminder = self
            .reminders
            .create_reminder(&self.user_id, text, remind_at)
            .await
            .map_err(|e| ToolError::from_service(self.name(), e))?;

        Ok(ToolResult::ok(format!(
            "Напоминание создано на {} (id: {}).",
            reminder.remind_at.to_rfc3339(),
            reminder.id
        ))
        .with_data(serde_json::json!({ "id": reminder.id })))
    }
}

pub struct ListRemindersTool {
    reminders: Arc<dyn ReminderService>,
    user_id: UserId,
}

impl ListRemindersTool {
    pub fn new(reminders: Arc<dyn ReminderService>, user_id: UserId) -> Self {
        Self { reminders, user_id }
    }
}

#[async_trait]
impl Tool for ListRemindersTool {
    fn name(&self) -> &str {
        "list_reminders"
    }

    fn description(&self) -> &str {
        "List the user's pending reminders."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let mut reminders = self
            .reminders
            .list_reminders(&self.user_id)
            .await
            .map_err(|e| ToolError::from_service(self.name(), e))?;

        if reminders.is_empty() {
            return Ok(ToolResult::ok("Активных напоминаний нет."));
        }

        reminders.sort_by_key(|r| r.remind_at);
        let output = reminders
            .iter()
            .map(|r| format!("- [{}] {}: {}", r.id, r.remind_at.to_rfc3339(), r.text))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolResult::ok(output))
    }
}

pub struct DeleteReminderTool {
    reminders: Arc<dyn ReminderService>,
    user_id: UserId,
}

impl DeleteReminderTool {
    pub fn new(reminders: Arc<dyn ReminderService>, user_id: UserId) -> Self {
        Self { reminders, user_id }
    }
}

#[async_trait]
impl Tool for DeleteReminderTool {
    fn name(&self) -> &str {
        "delete_reminder"
    }

    fn description(&self) -> &str {
        "Cancel a pending reminder by id (ids come from list_reminders)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reminder_id": { "type": "string" }
            },
            "required": ["reminder_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let reminder_id = required_str(self.name(), &arguments, "reminder_id")?;
        let deleted = self
            .reminders
            .delete_reminder(&self.user_id, reminder_id)
            .await
            .map_err(|e| ToolError::from_service(self.name(), e))?;

        if deleted {
            Ok(ToolResult::ok("Напоминание удалено."))
        } else {
            Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("no reminder with id '{reminder_id}'"),
            })
        }
    }
}
