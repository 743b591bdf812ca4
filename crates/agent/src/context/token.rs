//! Token estimation.
//!
//! Uses a byte-based heuristic: ~4 bytes per token, rounded up, plus a fixed
//! per-message overhead for role and framing. Cyrillic text costs two bytes
//! per character, which keeps the estimate on the safe side for Russian.

use secretary_core::message::Message;

/// Framing cost of one message on the wire.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Token cost estimate of a message sequence.
///
/// Implementations must be monotonic: adding a message, or making any
/// message longer, never lowers the estimate.
pub trait TokenEstimator: Send + Sync {
    fn estimate_message(&self, message: &Message) -> usize;

    fn estimate(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

/// The default 4-bytes-per-token estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate_message(&self, message: &Message) -> usize {
        let calls: usize = message
            .tool_calls
            .iter()
            .map(|tc| estimate_tokens(&tc.name) + estimate_tokens(&tc.arguments))
            .sum();
        MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&message.content) + calls
    }
}
