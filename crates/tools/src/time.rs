//! Current time lookup.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use secretary_core::error::ToolError;
use secretary_core::tool::{Tool, ToolResult};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time, optionally at a UTC offset such as +03:00."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "utc_offset": {
                    "type": "string",
                    "description": "Offset from UTC, e.g. \"+03:00\" (default: +00:00)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let offset = match arguments["utc_offset"].as_str() {
            Some(raw) => raw.parse::<FixedOffset>().map_err(|e| {
                ToolError::InvalidArguments(format!("get_current_time: bad utc_offset '{raw}': {e}"))
            })?,
            None => FixedOffset::east_opt(0)
                .ok_or_else(|| ToolError::InvalidArguments("get_current_time: offset".into()))?,
        };

        let now = Utc::now().with_timezone(&offset);
        Ok(ToolResult::ok(now.to_rfc3339()).with_data(serde_json::json!({
            "iso": now.to_rfc3339(),
            "weekday": now.format("%A").to_string(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_is_utc() {
        let result = CurrentTimeTool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.output.ends_with("+00:00"));
        assert!(result.data.unwrap()["weekday"].is_string());
    }

    #[tokio::test]
    async fn offset_applied() {
        let result = CurrentTimeTool
            .execute(serde_json::json!({"utc_offset": "+03:00"}))
            .await
            .unwrap();
        assert!(result.output.ends_with("+03:00"));
    }

    #[tokio::test]
    async fn bad_offset_rejected() {
        let err = CurrentTimeTool
            .execute(serde_json::json!({"utc_offset": "Moscow"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
