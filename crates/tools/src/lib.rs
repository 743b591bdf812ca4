//! Built-in tool implementations for Secretary.
//!
//! Tools give an assistant the ability to act for its user: read and
//! create calendar events, schedule reminders, remember facts and tell
//! the time. Each tool is bound to one user when an assistant instance is
//! built, so the model never passes a user id itself.
//!
//! Assistant configurations name *tool ids* ("calendar", "reminders",
//! "facts", "time"); `ToolResolver` expands each id into concrete tools.

pub mod calendar;
pub mod facts;
pub mod reminders;
pub mod time;

use chrono::{DateTime, Utc};
use secretary_core::error::{ConfigurationError, ToolError};
use secretary_core::ids::UserId;
use secretary_core::services::{CalendarService, FactStore, ReminderService};
use secretary_core::tool::ToolRegistry;
use std::sync::Arc;

pub use facts::{FACT_SAVED_MESSAGE, SAVE_FACT_TOOL_NAME};

/// Tool ids understood by `ToolResolver`.
pub const KNOWN_TOOL_IDS: &[&str] = &["calendar", "reminders", "facts", "time"];

/// Expands configured tool ids into user-bound tools.
#[derive(Clone)]
pub struct ToolResolver {
    calendar: Arc<dyn CalendarService>,
    reminders: Arc<dyn ReminderService>,
    facts: Arc<dyn FactStore>,
}

impl ToolResolver {
    pub fn new(
        calendar: Arc<dyn CalendarService>,
        reminders: Arc<dyn ReminderService>,
        facts: Arc<dyn FactStore>,
    ) -> Self {
        Self {
            calendar,
            reminders,
            facts,
        }
    }

    /// Register the tools behind `tool_id` for `user_id`.
    pub fn register(
        &self,
        registry: &mut ToolRegistry,
        tool_id: &str,
        user_id: &UserId,
    ) -> Result<(), ConfigurationError> {
        match tool_id {
            "calendar" => {
                registry.register(Box::new(calendar::ListCalendarEventsTool::new(
                    self.calendar.clone(),
                    user_id.clone(),
                )));
                registry.register(Box::new(calendar::CreateCalendarEventTool::new(
                    self.calendar.clone(),
                    user_id.clone(),
                )));
            }
            "reminders" => {
                registry.register(Box::new(reminders::CreateReminderTool::new(
                    self.reminders.clone(),
                    user_id.clone(),
                )));
                registry.register(Box::new(reminders::ListRemindersTool::new(
                    self.reminders.clone(),
                    user_id.clone(),
                )));
                registry.register(Box::new(reminders::DeleteReminderTool::new(
                    self.reminders.clone(),
                    user_id.clone(),
                )));
            }
            "facts" => {
                registry.register(Box::new(facts::SaveUserFactTool::new(
                    self.facts.clone(),
                    user_id.clone(),
                )));
            }
            "time" => registry.register(Box::new(time::CurrentTimeTool)),
            other => return Err(ConfigurationError::UnknownTool(other.to_string())),
        }
        Ok(())
    }

    /// The fact store backing `save_user_fact`, also read by context injection.
    pub fn fact_store(&self) -> Arc<dyn FactStore> {
        self.facts.clone()
    }
}

/// Parse a model-supplied timestamp. An explicit offset is required so the
/// model cannot silently schedule in the wrong timezone.
pub(crate) fn parse_datetime(
    tool: &str,
    field: &str,
    value: &serde_json::Value,
) -> Result<DateTime<Utc>, ToolError> {
    let raw = value.as_str().ok_or_else(|| {
        ToolError::InvalidArguments(format!("{tool}: '{field}' must be a string"))
    })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ToolError::InvalidArguments(format!(
                "{tool}: '{field}' must be RFC 3339 with an offset, got '{raw}': {e}"
            ))
        })
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(
    tool: &str,
    arguments: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, ToolError> {
    arguments[field]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("{tool}: missing '{field}' argument")))
}


#[cfg(test)]
mod tests {
    use super::*;
    use secretary_memory::InMemoryFactStore;
    use test_support::{FakeCalendar, FakeReminders};

    fn resolver() -> ToolResolver {
        ToolResolver::new(
            Arc::new(FakeCalendar::default()),
            Arc::new(FakeReminders::default()),
            Arc::new(InMemoryFactStore::new()),
        )
    }

    #[test]
    fn known_ids_expand_to_tools() {
        let resolver = resolver();
        let mut registry = ToolRegistry::new();
        let user = UserId::new("u1");
        for id in KNOWN_TOOL_IDS {
            resolver.register(&mut registry, id, &user).unwrap();
        }
        assert_eq!(
            registry.names(),
            vec![
                "create_calendar_event",
                "create_reminder",
                "delete_reminder",
                "get_current_time",
                "list_calendar_events",
                "list_reminders",
                "save_user_fact",
            ]
        );
    }

    #[test]
    fn unknown_id_is_configuration_error() {
        let mut registry = ToolRegistry::new();
        let err = resolver()
            .register(&mut registry, "teleport", &UserId::new("u1"))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownTool("teleport".into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn datetime_requires_offset() {
        let ok = parse_datetime("t", "at", &serde_json::json!("2026-10-18T09:00:00+03:00")).unwrap();
        assert_eq!(ok.to_rfc3339(), "2026-10-18T06:00:00+00:00");
        assert!(parse_datetime("t", "at", &serde_json::json!("2026-10-18T09:00:00")).is_err());
        assert!(parse_datetime("t", "at", &serde_json::json!(42)).is_err());
    }
}
