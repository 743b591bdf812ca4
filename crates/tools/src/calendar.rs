//! Calendar tools backed by the calendar microservice.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secretary_core::error::ToolError;
use secretary_core::ids::UserId;
use secretary_core::services::{CalendarService, NewCalendarEvent};
use secretary_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use crate::{parse_datetime, required_str};

/// Window used when the model omits `to`.
const DEFAULT_LOOKAHEAD_DAYS: i64 = 7;

/// Event length used when the model omits `end`.
const DEFAULT_EVENT_MINUTES: i64 = 60;

pub struct ListCalendarEventsTool {
    calendar: Arc<dyn CalendarService>,
    user_id: UserId,
}

impl ListCalendarEventsTool {
    pub fn new(calendar: Arc<dyn CalendarService>, user_id: UserId) -> Self {
        Self { calendar, user_id }
    }
}

#[async_trait]
impl Tool for ListCalendarEventsTool {
    fn name(&self) -> &str {
        "list_calendar_events"
    }

    fn description(&self) -> &str {
        "List the user's calendar events in a time range. Defaults to the next 7 days."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from": {
                    "type": "string",
                    "description": "Range start, RFC 3339 with offset (default: now)"
                },
                "to": {
                    "type": "string",
                    "description": "Range end, RFC 3339 with offset (default: 7 days after start)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let from = match arguments.get("from") {
            Some(v) if !v.is_null() => parse_datetime(self.name(), "from", v)?,
            _ => Utc::now(),
        };
        let to = match arguments.get("to") {
            Some(v) if !v.is_null() => parse_datetime(self.name(), "to", v)?,
            _ => from + Duration::days(DEFAULT_LOOKAHEAD_DAYS),
        };
        if to <= from {
            return Err(ToolError::InvalidArguments(
                "list_calendar_events: 'to' must be after 'from'".into(),
            ));
        }

        let events = self
            .calendar
            .list_events(&self.user_id, from, to)
            .await
            .map_err(|e| ToolError::from_service(self.name(), e))?;

        if events.is_empty() {
            return Ok(ToolResult::ok("В этом периоде событий нет."));
        }

        let data = serde_json::to_value(&events)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;
        let output = serde_json::to_string_pretty(&data).unwrap_or_default();
        Ok(ToolResult::ok(output).with_data(data))
    }
}

pub struct CreateCalendarEventTool {
    calendar: Arc<dyn CalendarService>,
    user_id: UserId,
}

impl CreateCalendarEventTool {
    pub fn new(calendar: Arc<dyn CalendarService>, user_id: UserId) -> Self {
        Self { calendar, user_id }
    }
}

#[async_trait]
impl Tool for CreateCalendarEventTool {
    fn name(&self) -> &str {
        "create_calendar_event"
    }

    fn description(&self) -> &str {
        "Create an event in the user's calendar."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Short event title" },
                "start": { "type": "string", "description": "Start, RFC 3339 with offset" },
                "end": { "type": "string", "description": "End, RFC 3339 with offset (default: start + 1h)" },
                "description": { "type": "string", "description": "Optional notes" }
            },
            "required": ["title", "start"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let title = required_str(self.name(), &arguments, "title")?.to_string();
        let start = parse_datetime(self.name(), "start", &arguments["start"])?;
        let end = match arguments.get("end") {
            Some(v) if !v.is_null() => parse_datetime(self.name(), "end", v)?,
            _ => start + Duration::minutes(DEFAULT_EVENT_MINUTES),
        };
        if end <= start {
            return Err(ToolError::InvalidArguments(
                "create_calendar_event: 'end' must be after 'start'".into(),
            ));
        }

        let event = NewCalendarEvent {
            title,
            start,
            end,
            description: arguments["description"].as_str().map(String::from),
        };
        let created = self
            .calendar
            .create_event(&self.user_id, event)
            .await
            .map_err(|e| ToolError::from_service(self.name(), e))?;

        Ok(ToolResult::ok(format!(
            "Событие «{}» создано на {}.",
            created.title,
            created.start.to_rfc3339()
        ))
        .with_data(serde_json::json!({ "id": created.id })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCalendar;
    use secretary_core::error::{Retryable, ServiceError};

    #[tokio::test]
    async fn create_then_list() {
        let calendar = Arc::new(FakeCalendar::default());
        let user = UserId::new("u1");
        let create = CreateCalendarEventTool::new(calendar.clone(), user.clone());
        let list = ListCalendarEventsTool::new(calendar.clone(), user);

        let start = (Utc::now() + Duration::days(1)).to_rfc3339();
        let result = create
            .execute(serde_json::json!({"title": "Стоматолог", "start": start}))
            .await
            .unwrap();
        assert!(result.output.contains("Стоматолог"));

        let stored = calendar.events.lock().unwrap()[0].clone();
        assert_eq!(stored.end - stored.start, Duration::minutes(60));

        let listed = list.execute(serde_json::json!({})).await.unwrap();
        assert!(listed.output.contains("Стоматолог"));
    }

    #[tokio::test]
    async fn empty_range_reports_no_events() {
        let list = ListCalendarEventsTool::new(Arc::new(FakeCalendar::default()), UserId::new("u1"));
        let result = list.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result.output, "В этом периоде событий нет.");
    }

    #[tokio::test]
    async fn inverted_range_rejected() {
        let list = ListCalendarEventsTool::new(Arc::new(FakeCalendar::default()), UserId::new("u1"));
        let err = list
            .execute(serde_json::json!({
                "from": "2026-10-20T10:00:00+00:00",
                "to": "2026-10-19T10:00:00+00:00"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn transient_service_failure_is_retryable() {
        let calendar = Arc::new(FakeCalendar::default());
        *calendar.fail_with.lock().unwrap() = Some(ServiceError::Http {
            status: 503,
            message: "maintenance".into(),
        });
        let list = ListCalendarEventsTool::new(calendar, UserId::new("u1"));
        let err = list.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
