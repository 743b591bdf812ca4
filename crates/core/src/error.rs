//! Error types for the Secretary domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant; `ErrorCode` is the stable
//! classification reported to callers and operators.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The top-level error type for all Secretary operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Malformed node input ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Remote configuration errors ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Conversation history ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Collaborator services ---
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification surfaced in turn failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ModelError,
    ToolError,
    ValidationError,
    RateLimitError,
    ConfigurationError,
    HistoryError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelError => "model_error",
            Self::ToolError => "tool_error",
            Self::ValidationError => "validation_error",
            Self::RateLimitError => "rate_limit_error",
            Self::ConfigurationError => "configuration_error",
            Self::HistoryError => "history_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for reporting.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Provider(ProviderError::RateLimited { .. }) => ErrorCode::RateLimitError,
            Self::Provider(_) => ErrorCode::ModelError,
            Self::Tool(_) => ErrorCode::ToolError,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::History(_) => ErrorCode::HistoryError,
            Self::Service(_) | Self::Serialization(_) | Self::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }
}

/// Errors that may be retried locally with backoff.
pub trait Retryable {
    /// Whether the failure is transient (rate limit, connection, timeout).
    fn is_retryable(&self) -> bool;

    /// A server-provided hint for how long to wait before retrying.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Unusable model output: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool temporarily unavailable: {tool_name} — {reason}")]
    Unavailable { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Model kept requesting tools after {limit} rounds")]
    IterationLimit { limit: u32 },
}

impl ToolError {
    /// Wrap a collaborator failure, keeping its transient/permanent nature.
    pub fn from_service(tool_name: &str, err: ServiceError) -> Self {
        if err.is_retryable() {
            Self::Unavailable {
                tool_name: tool_name.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl Retryable for ToolError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Failures while resolving or building an assistant instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Assistant configuration store unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed assistant configuration: {0}")]
    Malformed(String),

    #[error("Assistant not found: {0}")]
    NotFound(String),

    #[error("Timezone-naive updated_at '{value}' for assistant {assistant_id}")]
    NaiveTimestamp { assistant_id: String, value: String },

    #[error("Cannot resolve tool '{0}'")]
    UnknownTool(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt history entry: {0}")]
    Corrupt(String),
}

/// Failures of REST collaborators (backend, calendar, notifications).
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<ServiceError> for ConfigurationError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => Self::NotFound(what),
            ServiceError::Decode(reason) => Self::Malformed(reason),
            other => Self::Unreachable(other.to_string()),
        }
    }
}
