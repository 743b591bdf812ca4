//! Prompt context: what the model sees besides the raw turn entries.
//!
//! | Piece | Source | Refresh |
//! |-------|--------|---------|
//! | Instructions | Assistant configuration | Instance rebuild |
//! | Summary | Summarizer over older history | Over token budget |
//! | Facts | Fact store | After `save_user_fact` succeeds |
//! | Trigger | Inbound event | Every triggered turn |

pub mod cache;
pub mod compaction;
pub mod summarizer;
pub mod token;

pub use cache::{PromptContextCache, SharedContextCache, SummarySnapshot};
pub use compaction::{CompactionReport, CompactionSettings, Compactor, split_point};
pub use summarizer::{LlmSummarizer, Summarizer};
pub use token::{HeuristicEstimator, TokenEstimator, estimate_tokens};
