//! LLM Provider implementations for Secretary.
//!
//! All providers implement the `secretary_core::Provider` trait.
//! `factory::build_from_config` constructs the configured one.

pub mod factory;
pub mod openai_compat;

pub use factory::build_from_config;
pub use openai_compat::OpenAiCompatProvider;
