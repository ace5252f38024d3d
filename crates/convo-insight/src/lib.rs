//! Convo Insight crate - key-point extraction, topic grouping and summaries.
//!
//! Provides the analysis side of a conversation:
//! - Key-point extraction through a generative-language model, with a
//!   text fallback parser and degenerate results instead of errors
//! - Grouping of responses under their topics in chronological order
//! - De-duplicated key-point rollups per topic
//! - Plain-text meeting summaries for export

pub mod error;
pub mod extractor;
pub mod grouper;
pub mod llm;
pub mod summary;

pub use error::LlmError;
pub use extractor::{KeyPointExtractor, KeyPointLimits, ANALYSIS_FAILED};
pub use grouper::{group_by_topic, key_point_rollup, TopicGroups};
pub use llm::{GeminiClient, LanguageModel, MockLanguageModel};
pub use summary::{MeetingSummary, SHARE_TITLE};
