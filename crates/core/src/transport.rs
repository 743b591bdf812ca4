//! Inbound and outbound transport contracts.
//!
//! Inbound events arrive either as a user message or as a trigger (for
//! example a fired reminder). The orchestrator answers each with response
//! text or a `TurnFailure`; delivery is the caller's job via `ResponseSink`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::{Error, ErrorCode};
use crate::ids::UserId;

/// Apology shown to the end user whenever a turn fails.
pub const USER_FAILURE_MESSAGE: &str =
    "Извините, не удалось обработать ваш запрос. Попробуйте ещё раз позже.";

/// A trigger payload from an external scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Kind of trigger (e.g. "reminder")
    pub trigger_type: String,

    /// Arbitrary payload as sent by the trigger source
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One inbound unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    UserMessage {
        user_id: UserId,
        content: String,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    Trigger {
        user_id: UserId,
        trigger_type: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl InboundEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::UserMessage { user_id, .. } | Self::Trigger { user_id, .. } => user_id,
        }
    }
}

/// Structured result of a failed turn.
///
/// `message` is safe to show the end user; `code` and `detail` are for
/// operators and never contain more than the error's display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnFailure {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl TurnFailure {
    pub fn from_error(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: USER_FAILURE_MESSAGE.to_string(),
            detail: serde_json::json!({ "error": err.to_string() }),
        }
    }
}

impl std::fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.detail)
    }
}

/// Outbound delivery collaborator (chat platform, notification service).
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, user_id: &UserId, text: &str) -> Result<(), crate::error::ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    #[test]
    fn inbound_event_tagged_json() {
        let json = r#"{"kind":"trigger","user_id":"u1","trigger_type":"reminder","payload":{"text":"call mom"}}"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.user_id().as_str(), "u1");
        assert!(matches!(event, InboundEvent::Trigger { ref trigger_type, .. } if trigger_type == "reminder"));

        let json = r#"{"kind":"user_message","user_id":"u1","content":"hi"}"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, InboundEvent::UserMessage { .. }));
    }

    #[test]
    fn failure_hides_internals_from_user_message() {
        let err = Error::Provider(ProviderError::AuthenticationFailed("sk-secret rejected".into()));
        let failure = TurnFailure::from_error(&err);
        assert_eq!(failure.code, ErrorCode::ModelError);
        assert_eq!(failure.message, USER_FAILURE_MESSAGE);
        assert!(!failure.message.contains("sk-secret"));
        assert!(failure.detail["error"].as_str().unwrap().contains("Authentication"));
    }
}
