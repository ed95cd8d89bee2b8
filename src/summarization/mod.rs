//! Summarization of evicted conversation content
//!
//! Messages are grouped into topically and temporally coherent clusters and
//! compressed with one of several interchangeable strategies. Long inputs are
//! summarized in chunks and then summarized again, bounding the cost of any
//! single pass.

pub mod analysis;
pub mod cache;
pub mod extractive;
pub mod model;
pub mod quality;
pub mod summarizer;
pub mod templates;

pub use analysis::{cluster_messages, derive_context, MessageCluster, SummarizationContext};
pub use cache::SummaryCache;
pub use model::{LanguageModel, LlmClient, ModelError};
pub use quality::SummaryQuality;
pub use summarizer::{ConversationSummarizer, SummaryHints};

use serde::{Deserialize, Serialize};

/// How a set of messages is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummarizationStrategy {
    /// Select verbatim sentences and high-importance messages
    Extractive,
    /// Delegate to the language model, falling back to extractive
    Abstractive,
    /// Extractive key interactions plus an abstractive overview
    #[default]
    Hybrid,
    /// Fill a topic-specific template
    TemplateBased,
}

impl SummarizationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarizationStrategy::Extractive => "extractive",
            SummarizationStrategy::Abstractive => "abstractive",
            SummarizationStrategy::Hybrid => "hybrid",
            SummarizationStrategy::TemplateBased => "template_based",
        }
    }
}
