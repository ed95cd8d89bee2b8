//! Context management
//!
//! Messages are enhanced with heuristics, appended to token-bounded windows
//! and periodically compressed by summarizing older content and pruning by
//! importance. [`ContextManager`] ties these pieces to a conversation's
//! branch tree and persistence.

pub mod enhancer;
pub mod manager;
pub mod models;
pub mod similarity;
pub mod token_estimator;
pub mod window;

pub use enhancer::{
    EntityExtractor, KeywordTopicExtractor, LexiconSentimentClassifier, MessageEnhancer,
    PatternEntityExtractor, SentimentClassifier, TopicExtractor,
};
pub use manager::{
    AddMessageOutcome, ContextExport, ContextManager, ContextServices, OptimizationReport,
};
pub use models::{
    ContextStats, ContextSummary, ContextWindow, EnhancedMessage, IncomingMessage,
    MessageIntent, MessageMetadata, MessageRole, ModelMessage, Sentiment, WindowMetadata,
};
pub use token_estimator::{
    build_estimator, HeuristicEstimator, TiktokenEstimator, TokenEstimate, TokenEstimator,
};
pub use window::OptimizeTrigger;
