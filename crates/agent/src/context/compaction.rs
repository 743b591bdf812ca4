//! Keeping model input within the token budget.
//!
//! History is never rewritten. The cache's `summarized_through` watermark
//! marks how many leading entries the summary covers; the model sees the
//! summary plus `history[summarized_through..]`. Compaction moves the
//! watermark forward.

use secretary_config::CompactionConfig;
use secretary_core::error::ProviderError;
use secretary_core::message::Message;
use std::sync::Arc;
use tracing::{debug, info};
use super::cache::SharedContextCache;
use super::summarizer::Summarizer;
use super::token::TokenEstimator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionSettings {
    /// Estimated input above which older history is summarized
    pub max_input_tokens: usize,
    /// Budget for the verbatim tail after summarizing
    pub keep_recent_tokens: usize,
}

impl From<&CompactionConfig> for CompactionSettings {
    fn from(config: &CompactionConfig) -> Self {
        Self {
            max_input_tokens: config.max_input_tokens,
            keep_recent_tokens: config.keep_recent_tokens,
        }
    }
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self::from(&CompactionConfig::default())
    }
}

/// Index at which the verbatim tail starts.
///
/// The tail is the longest suffix of `messages[from..]` fitting in
/// `keep_recent_tokens`, always holding at least the last entry, and never
/// starting with a tool result (the tail is widened back to the tool-call
/// entry that produced it). Returns `from` when nothing can be folded.
pub fn split_point(
    messages: &[Message],
    from: usize,
    keep_recent_tokens: usize,
    estimator: &dyn TokenEstimator,
) -> usize {
    let len = messages.len();
    if from >= len {
        return len;
    }

    let mut split = len;
    let mut used = 0;
    while split > from {
        let cost = estimator.estimate_message(&messages[split - 1]);
        if split < len && used + cost > keep_recent_tokens {
            break;
        }
        used += cost;
        split -= 1;
    }

    while split > from && messages[split].is_tool_result() {
        split -= 1;
    }
    split
}

/// What one compaction pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    pub summarized_through: usize,
    pub folded: usize,
}

pub struct Compactor {
    settings: CompactionSettings,
    estimator: Arc<dyn TokenEstimator>,
    summarizer: Arc<dyn Summarizer>,
}

impl Compactor {
    pub fn new(
        settings: CompactionSettings,
        estimator: Arc<dyn TokenEstimator>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            settings,
            estimator,
            summarizer,
        }
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Estimated size of `system` plus the uncompacted window.
    pub fn input_tokens(&self, system: &Message, window: &[Message]) -> usize {
        self.estimator.estimate_message(system) + self.estimator.estimate(window)
    }

    pub fn over_budget(&self, system: &Message, window: &[Message]) -> bool {
        self.input_tokens(system, window) > self.settings.max_input_tokens
    }

    /// Fold older entries into the summary.
    ///
    /// The cache is written only after the summarizer returns. Returns
    /// `None` when there was nothing left to fold.
    pub async fn compact(
        &self,
        cache: &SharedContextCache,
        history: &[Message],
    ) -> Result<Option<CompactionReport>, ProviderError> {
        let (previous, from) = {
            let cache = cache.read().await;
            (cache.summary().map(String::from), cache.summarized_through().min(history.len()))
        };

        let split = split_point(history, from, self.settings.keep_recent_tokens, self.estimator());
        if split <= from {
            debug!(from, "Nothing to compact");
            return Ok(None);
        }

        let summary = self
            .summarizer
            .summarize(previous.as_deref(), &history[from..split])
            .await?;

        cache.write().await.update_summary(Some(summary), split);
        info!(summarized_through = split, folded = split - from, "History compacted");
        Ok(Some(CompactionReport {
            summarized_through: split,
            folded: split - from,
        }))
    }

    /// Bring the summary up to date: compact when `system` plus the window
    /// exceeds the budget, then clear the refresh flag either way.
    pub async fn refresh(
        &self,
        cache: &SharedContextCache,
        system: &Message,
        history: &[Message],
    ) -> Result<Option<CompactionReport>, ProviderError> {
        let from = cache.read().await.summarized_through().min(history.len());
        let report = if self.over_budget(system, &history[from..]) {
            self.compact(cache, history).await?
        } else {
            None
        };

        let mut cache = cache.write().await;
        if cache.needs_summary_refresh() {
            let (summary, through) = (cache.summary().map(String::from), cache.summarized_through());
            cache.update_summary(summary, through);
        }
        Ok(report)
    }
}
