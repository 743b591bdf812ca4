//! Assistant configuration as served by the remote REST backend.
//!
//! The backend is authoritative for instructions, model and tool set; the
//! orchestrator only caches built runtimes and revalidates them against
//! `updated_at`.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::error::ConfigurationError;
use crate::ids::{AssistantId, UserId};

/// Naive layouts the backend has been seen to emit (no offset).
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A timestamp as received from the remote store.
///
/// The remote side is expected to send timezone-aware values, but the type
/// keeps naive values representable so they can be rejected explicitly
/// instead of being silently read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTimestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl RemoteTimestamp {
    /// Parse an ISO-8601 / RFC 3339 string.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::Aware(aware));
        }
        if let Ok(aware) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Ok(Self::Aware(aware));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(Self::Naive)
            .ok_or_else(|| format!("unrecognised timestamp '{raw}'"))
    }

    /// Normalize to UTC, refusing timezone-naive values.
    pub fn to_utc(&self, assistant_id: &AssistantId) -> Result<DateTime<Utc>, ConfigurationError> {
        match self {
            Self::Aware(ts) => Ok(ts.with_timezone(&Utc)),
            Self::Naive(ts) => Err(ConfigurationError::NaiveTimestamp {
                assistant_id: assistant_id.to_string(),
                value: ts.to_string(),
            }),
        }
    }

    pub fn is_naive(&self) -> bool {
        matches!(self, Self::Naive(_))
    }
}

impl From<DateTime<Utc>> for RemoteTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Aware(ts.fixed_offset())
    }
}

impl std::fmt::Display for RemoteTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aware(ts) => f.write_str(&ts.to_rfc3339()),
            Self::Naive(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl Serialize for RemoteTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RemoteTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// An assistant definition fetched from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub id: AssistantId,

    /// Display name, used when the assistant is exposed as a sub-agent
    #[serde(default)]
    pub name: String,

    /// Last modification time; compared against cached instances
    pub updated_at: RemoteTimestamp,

    /// System instructions
    #[serde(default)]
    pub instructions: String,

    /// Model override; empty means the orchestrator default
    #[serde(default)]
    pub model: String,

    /// Tool identifiers to bind (`calendar`, `reminders`, `sub_assistant:<id>`, ...)
    #[serde(default)]
    pub tool_ids: Vec<String>,
}

/// Remote assistant-configuration store (the REST backend).
#[async_trait]
pub trait AssistantStore: Send + Sync {
    /// Fetch the authoritative configuration of an assistant.
    async fn get_assistant(&self, id: &AssistantId) -> Result<AssistantConfig, ConfigurationError>;

    /// Which assistant acts as the given user's secretary.
    async fn get_user_secretary(&self, user_id: &UserId) -> Result<AssistantId, ConfigurationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_offset_and_zulu_as_aware() {
        let ts = RemoteTimestamp::parse("2025-03-01T10:00:00+03:00").unwrap();
        let utc = ts.to_utc(&AssistantId::new("a")).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap());

        let ts = RemoteTimestamp::parse("2025-03-01T07:00:00.250Z").unwrap();
        assert!(!ts.is_naive());
    }

    #[test]
    fn naive_timestamp_is_rejected_not_assumed_utc() {
        let ts = RemoteTimestamp::parse("2025-03-01T10:00:00.123456").unwrap();
        assert!(ts.is_naive());
        let err = ts.to_utc(&AssistantId::new("a1")).unwrap_err();
        assert!(matches!(err, ConfigurationError::NaiveTimestamp { ref assistant_id, .. } if assistant_id == "a1"));

        let spaced = RemoteTimestamp::parse("2025-03-01 10:00:00").unwrap();
        assert!(spaced.is_naive());
    }

    #[test]
    fn garbage_timestamp_fails_to_deserialize() {
        let json = r#"{"id":"a","updated_at":"yesterday"}"#;
        assert!(serde_json::from_str::<AssistantConfig>(json).is_err());
    }

    #[test]
    fn assistant_config_defaults() {
        let json = r#"{"id":"a","updated_at":"2025-01-01T00:00:00Z"}"#;
        let cfg: AssistantConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.tool_ids.is_empty());
        assert!(cfg.model.is_empty());
        let back = serde_json::to_string(&cfg).unwrap();
        assert!(back.contains("2025-01-01T00:00:00+00:00"));
    }
}
