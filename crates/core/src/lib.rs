//! # Secretary Core
//!
//! Domain types, traits, and error definitions for the Secretary assistant
//! runtime. This crate has **no transport or storage dependencies**. It
//! defines the domain model and the narrow collaborator contracts that the
//! rest of the workspace implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM provider, REST backend, history store,
//! calendar and notification services) is a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with in-memory stand-ins
//! - Clean dependency graph (all crates depend inward on core)

pub mod assistant;
pub mod error;
pub mod event;
pub mod history;
pub mod ids;
pub mod message;
pub mod provider;
pub mod services;
pub mod tool;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use assistant::{AssistantConfig, AssistantStore, RemoteTimestamp};
pub use error::{ConfigurationError, Error, ErrorCode, Result};
pub use event::{DomainEvent, EventBus};
pub use history::{Thread, ThreadId, ThreadStore};
pub use ids::{AssistantId, UserId};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use transport::{InboundEvent, ResponseSink, TriggerEvent, TurnFailure};
