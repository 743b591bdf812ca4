//! Prompt context cache: the conversation summary and the user's facts.
//!
//! Both values are refreshed lazily. Each has its own dirty flag; a set flag
//! means the next reader must refresh before trusting the value. Updating a
//! value clears only its own flag, requiring a refresh never discards the
//! value (it stays usable as a fallback if the refresh fails).

use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache shared between the nodes of one assistant instance.
pub type SharedContextCache = Arc<RwLock<PromptContextCache>>;

/// The summary half of the cache, taken before a turn so a failed turn can
/// put back a watermark that points into entries it never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySnapshot {
    summary: Option<String>,
    summarized_through: usize,
    needs_refresh: bool,
}

#[derive(Debug, Clone)]
pub struct PromptContextCache {
    summary: Option<String>,
    summarized_through: usize,
    facts: Option<Vec<String>>,
    needs_summary_refresh: bool,
    needs_fact_refresh: bool,
}

impl Default for PromptContextCache {
    fn default() -> Self {
        Self {
            summary: None,
            summarized_through: 0,
            facts: None,
            needs_summary_refresh: true,
            needs_fact_refresh: true,
        }
    }
}

impl PromptContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedContextCache {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Store a new summary covering the first `summarized_through` history
    /// entries.
    pub fn update_summary(&mut self, value: Option<String>, summarized_through: usize) {
        self.summary = value;
        self.summarized_through = summarized_through;
        self.needs_summary_refresh = false;
    }

    /// Store the user's facts, dropping repeats (first occurrence wins).
    pub fn update_facts(&mut self, value: Vec<String>) {
        let mut unique: Vec<String> = Vec::with_capacity(value.len());
        for fact in value {
            if !unique.contains(&fact) {
                unique.push(fact);
            }
        }
        self.facts = Some(unique);
        self.needs_fact_refresh = false;
    }

    pub fn require_summary_refresh(&mut self) {
        self.needs_summary_refresh = true;
    }

    pub fn require_fact_refresh(&mut self) {
        self.needs_fact_refresh = true;
    }

    pub fn summary_snapshot(&self) -> SummarySnapshot {
        SummarySnapshot {
            summary: self.summary.clone(),
            summarized_through: self.summarized_through,
            needs_refresh: self.needs_summary_refresh,
        }
    }

    /// Put the summary back as it was at `snapshot`. Facts are untouched.
    pub fn restore_summary(&mut self, snapshot: SummarySnapshot) {
        self.summary = snapshot.summary;
        self.summarized_through = snapshot.summarized_through;
        self.needs_summary_refresh = snapshot.needs_refresh;
    }

    /// Drop a summary whose watermark lies past the `len` entries actually
    /// stored. Returns whether anything was dropped.
    pub fn rebase(&mut self, len: usize) -> bool {
        if self.summarized_through <= len {
            return false;
        }
        self.summary = None;
        self.summarized_through = 0;
        self.needs_summary_refresh = true;
        true
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Number of leading history entries folded into the summary.
    pub fn summarized_through(&self) -> usize {
        self.summarized_through
    }

    pub fn facts(&self) -> &[String] {
        self.facts.as_deref().unwrap_or_default()
    }

    pub fn needs_summary_refresh(&self) -> bool {
        self.needs_summary_refresh
    }

    pub fn needs_fact_refresh(&self) -> bool {
        self.needs_fact_refresh
    }
}
