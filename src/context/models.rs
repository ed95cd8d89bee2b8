//! Data models for context management
//!
//! Timestamps on persisted types serialize as milliseconds since the Unix
//! epoch so stored windows carry an absolute, timezone-free representation.

use crate::summarization::quality::SummaryQuality;
use crate::summarization::SummarizationStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    ToolUse,
    ToolResult,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::ToolUse => "tool_use",
            MessageRole::ToolResult => "tool_result",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

/// Inferred purpose of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageIntent {
    Question,
    Request,
    Greeting,
    ToolCall,
    #[default]
    Statement,
}

/// A raw message as received from the chat application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Tools invoked by this message, if any
    #[serde(default)]
    pub tools: Vec<String>,
}

impl IncomingMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            timestamp: None,
            tools: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }
}

/// Free-form per-message annotations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub intent: MessageIntent,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Estimated prompt cost in USD
    pub cost_estimate: f64,
    /// Confidence of the token estimate
    pub token_confidence: f32,
    /// Set when this message caused a branch; such messages are never summarized
    #[serde(default)]
    pub context_switch: bool,
}

/// Atomic unit of conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub token_count: usize,
    /// Retention priority (0.0-1.0)
    pub importance: f32,
    /// Similarity to the preceding message (0.0-1.0)
    pub context_relevance: f32,
    pub topics: BTreeSet<String>,
    pub entities: Vec<String>,
    pub sentiment: Sentiment,
    pub metadata: MessageMetadata,
}

impl EnhancedMessage {
    /// Importance after exponential decay with the given half-life
    pub fn importance_at(&self, now: DateTime<Utc>, half_life_hours: f64) -> f32 {
        if half_life_hours <= 0.0 {
            return self.importance;
        }
        let age_hours = (now - self.timestamp).num_seconds().max(0) as f64 / 3600.0;
        let decay = 0.5f64.powf(age_hours / half_life_hours);
        (self.importance as f64 * decay) as f32
    }

    /// Seconds elapsed since the message was created
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_seconds()
    }
}

/// Lossy compression of evicted messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub id: String,
    /// Ids of every message folded into this summary, for audit only
    pub summarized_message_ids: Vec<String>,
    pub text: String,
    pub key_topics: Vec<String>,
    pub important_entities: Vec<String>,
    pub token_count: usize,
    /// How representative the summary is judged to be (0.0-1.0)
    pub confidence: f32,
    pub strategy: SummarizationStrategy,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Summary tokens divided by original tokens
    pub compression_ratio: f32,
    #[serde(default)]
    pub quality: Option<SummaryQuality>,
    /// 0 for summaries of raw messages, +1 per summary-of-summaries pass
    #[serde(default)]
    pub generation: u32,
}

impl ContextSummary {
    /// A zero-token summary of nothing
    pub fn empty(strategy: SummarizationStrategy) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            summarized_message_ids: Vec::new(),
            text: String::new(),
            key_topics: Vec::new(),
            important_entities: Vec::new(),
            token_count: 0,
            confidence: 0.0,
            strategy,
            created_at: Utc::now(),
            compression_ratio: 0.0,
            quality: None,
            generation: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Window bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowMetadata {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    pub optimization_count: u32,
    pub average_tokens_per_message: f32,
    /// Tokens of every message ever appended
    pub tokens_ingested: usize,
    pub messages_ingested: usize,
}

impl WindowMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_updated: now,
            optimization_count: 0,
            average_tokens_per_message: 0.0,
            tokens_ingested: 0,
            messages_ingested: 0,
        }
    }
}

/// Live, token-bounded conversation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    pub conversation_id: String,
    /// Chronological; never reordered
    pub messages: Vec<EnhancedMessage>,
    pub summary: Option<ContextSummary>,
    /// Sum of message tokens plus summary tokens
    pub token_count: usize,
    pub max_window_size: usize,
    pub max_tokens: usize,
    pub metadata: WindowMetadata,
}

/// A message in the sequence handed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
    pub token_count: usize,
}

/// Aggregate statistics for a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStats {
    pub conversation_id: String,
    pub active_branch_id: Option<String>,
    pub message_count: usize,
    pub token_count: usize,
    pub summarized_message_count: usize,
    pub summary_count: usize,
    pub branch_count: usize,
    pub average_importance: f32,
    /// Tokens ingested per token currently held; above 1.0 means compression is working
    pub token_efficiency: f32,
    pub optimization_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message_at(timestamp: DateTime<Utc>, importance: f32) -> EnhancedMessage {
        EnhancedMessage {
            id: "m1".to_string(),
            role: MessageRole::User,
            content: "hello".to_string(),
            timestamp,
            token_count: 2,
            importance,
            context_relevance: 0.5,
            topics: BTreeSet::new(),
            entities: Vec::new(),
            sentiment: Sentiment::Neutral,
            metadata: MessageMetadata::default(),
        }
    }

    #[test]
    fn test_importance_halves_after_half_life() {
        let now = Utc::now();
        let message = message_at(now - Duration::hours(24), 0.8);
        let decayed = message.importance_at(now, 24.0);
        assert!((decayed - 0.4).abs() < 0.01);
    }

    #[test]
    fn test_fresh_message_keeps_importance() {
        let now = Utc::now();
        let message = message_at(now, 0.6);
        assert!((message.importance_at(now, 24.0) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&MessageRole::ToolResult).unwrap();
        assert_eq!(json, "\"tool_result\"");
    }

    #[test]
    fn test_timestamps_serialize_as_epoch_millis() {
        let timestamp = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let message = message_at(timestamp, 0.5);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["timestamp"], serde_json::json!(1_700_000_000_000i64));
    }

    #[test]
    fn test_empty_summary() {
        let summary = ContextSummary::empty(SummarizationStrategy::Extractive);
        assert!(summary.is_empty());
        assert_eq!(summary.token_count, 0);
    }
}
