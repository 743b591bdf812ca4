//! Configuration loading, validation, and management for Secretary.
//!
//! Loads configuration from `~/.secretary/config.toml` with environment
//! variable overrides. Validates all settings at startup; the resulting
//! `AppConfig` is passed explicitly to every component that needs it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.secretary/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM API key (falls back to environment variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// REST backend and microservice endpoints
    #[serde(default)]
    pub backend: BackendConfig,

    /// Token budget and summarization
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Retry policy for model and tool calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Assistant instance cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversation history persistence
    #[serde(default)]
    pub history: HistoryConfig,

    /// Turn-level limits
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("backend", &self.backend)
            .field("compaction", &self.compaction)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("history", &self.history)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name used in logs ("openai", "openrouter", ...)
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_provider_url")]
    pub api_url: String,

    /// Model used when an assistant does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used for history summarization (defaults to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_provider_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_provider_url(),
            default_model: default_model(),
            summary_model: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// REST backend (users, assistants, facts)
    #[serde(default = "default_backend_url")]
    pub api_url: String,

    /// Bearer token for the REST backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Calendar microservice
    #[serde(default = "default_calendar_url")]
    pub calendar_url: String,

    /// Notification (reminder) microservice
    #[serde(default = "default_notifications_url")]
    pub notifications_url: String,

    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api".into()
}
fn default_calendar_url() -> String {
    "http://localhost:8001".into()
}
fn default_notifications_url() -> String {
    "http://localhost:8002".into()
}
fn default_backend_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: default_backend_url(),
            api_token: None,
            calendar_url: default_calendar_url(),
            notifications_url: default_notifications_url(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &redact(&self.api_token))
            .field("calendar_url", &self.calendar_url)
            .field("notifications_url", &self.notifications_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Estimated input size above which older history is summarized
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Budget for the verbatim tail kept after summarization
    #[serde(default = "default_keep_recent_tokens")]
    pub keep_recent_tokens: usize,
}

fn default_max_input_tokens() -> usize {
    6000
}
fn default_keep_recent_tokens() -> usize {
    2000
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: default_max_input_tokens(),
            keep_recent_tokens: default_keep_recent_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Skip the remote `updated_at` check for this long after the last one.
    /// 0 = revalidate on every request.
    #[serde(default)]
    pub revalidate_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// SQLite database path (defaults to `~/.secretary/history.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_history_backend() -> String {
    "sqlite".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model ↔ tool round trips per turn (safety limit)
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
}

fn default_max_tool_iterations() -> u32 {
    25
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.secretary/config.toml).
    ///
    /// Environment overrides:
    /// - `SECRETARY_API_KEY`, then `OPENAI_API_KEY`
    /// - `SECRETARY_MODEL`
    /// - `SECRETARY_BACKEND_URL`, `SECRETARY_BACKEND_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from a specific path and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("SECRETARY_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(model) = var("SECRETARY_MODEL") {
            self.provider.default_model = model;
        }
        if let Some(url) = var("SECRETARY_BACKEND_URL") {
            self.backend.api_url = url;
        }
        if let Some(token) = var("SECRETARY_BACKEND_TOKEN") {
            self.backend.api_token = Some(token);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".secretary")
    }

    /// Resolved SQLite history path.
    pub fn history_path(&self) -> PathBuf {
        self.history
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("history.db"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.compaction.keep_recent_tokens >= self.compaction.max_input_tokens {
            return Err(ConfigError::ValidationError(
                "compaction.keep_recent_tokens must be below compaction.max_input_tokens".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if !matches!(self.history.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "history.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.history.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.default_model, "gpt-4o-mini");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.cache.revalidate_after_secs, 0);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.api_url, config.provider.api_url);
        assert_eq!(parsed.compaction.max_input_tokens, config.compaction.max_input_tokens);
    }

    #[test]
    fn invalid_compaction_budget_rejected() {
        let mut config = AppConfig::default();
        config.compaction.keep_recent_tokens = config.compaction.max_input_tokens;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_history_backend_rejected() {
        let mut config = AppConfig::default();
        config.history.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.name, "openai");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[compaction]
max_input_tokens = 1000
keep_recent_tokens = 300

[cache]
revalidate_after_secs = 60
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.compaction.max_input_tokens, 1000);
        assert_eq!(config.cache.revalidate_after_secs, 60);
        assert_eq!(config.retry.max_backoff_ms, 8000);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("SECRETARY_MODEL", "gpt-4o"),
            ("SECRETARY_BACKEND_TOKEN", "tok"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.provider.default_model, "gpt-4o");
        assert_eq!(config.backend.api_token.as_deref(), Some("tok"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-very-secret".into());
        config.backend.api_token = Some("backend-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-very-secret"));
        assert!(!dbg.contains("backend-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("max_input_tokens"));
    }
}
