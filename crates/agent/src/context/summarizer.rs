//! Folding old history into a running summary.

use async_trait::async_trait;
use secretary_core::error::ProviderError;
use secretary_core::message::{Message, Role};
use secretary_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use crate::retry::{RetryPolicy, retry};

const SUMMARY_INSTRUCTIONS: &str = "You maintain a running summary of a conversation between a user and their personal secretary assistant. \
Merge the previous summary (if any) with the new transcript into one concise summary written in the language of the conversation. \
Keep names, dates, commitments, open questions and anything the assistant promised to do. Output only the summary.";

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a summary covering `previous` plus `messages`.
    async fn summarize(&self, previous: Option<&str>, messages: &[Message]) -> Result<String, ProviderError>;
}

/// Summarizer backed by the chat model.
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    retry: RetryPolicy,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            retry,
        }
    }
}

/// Render entries as a plain transcript for the summarizer prompt.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        let line = match m.role {
            Role::User => format!("User: {}", m.content),
            Role::Assistant if m.is_tool_call_request() => {
                let names: Vec<&str> = m.tool_calls.iter().map(|c| c.name.as_str()).collect();
                format!("Assistant called tools: {}", names.join(", "))
            }
            Role::Assistant => format!("Assistant: {}", m.content),
            Role::Tool => format!(
                "Tool {}: {}",
                m.tool_name.as_deref().unwrap_or("?"),
                m.content
            ),
            Role::System => format!("Event: {}", m.content),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, previous: Option<&str>, messages: &[Message]) -> Result<String, ProviderError> {
        let mut prompt = String::new();
        if let Some(previous) = previous {
            prompt.push_str("Previous summary:\n");
            prompt.push_str(previous);
            prompt.push_str("\n\n");
        }
        prompt.push_str("New transcript:\n");
        prompt.push_str(&render_transcript(messages));

        let mut request = ProviderRequest::new(
            &self.model,
            vec![Message::system(SUMMARY_INSTRUCTIONS), Message::user(prompt)],
        );
        request.temperature = 0.2;

        let response = retry(&self.retry, "summarize", || self.provider.complete(request.clone())).await?;
        let summary = response.message.content.trim().to_string();
        if summary.is_empty() {
            return Err(ProviderError::InvalidResponse("empty summary".into()));
        }
        Ok(summary)
    }
}
