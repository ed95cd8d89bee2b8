//! Summarization context and clustering

use crate::context::models::{EnhancedMessage, MessageRole, Sentiment};
use crate::context::similarity::jaccard;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

const KEY_TOPIC_LIMIT: usize = 5;
const ENTITY_LIMIT: usize = 10;

/// What a set of messages is about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationContext {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub participants: Vec<MessageRole>,
    /// Most frequent topics, at most five
    pub key_topics: Vec<String>,
    /// Most frequent entities, at most ten
    pub important_entities: Vec<String>,
    pub dominant_sentiment: Sentiment,
    pub message_count: usize,
    pub total_tokens: usize,
}

/// Derive the context of a message set; `None` when empty
pub fn derive_context(messages: &[EnhancedMessage]) -> Option<SummarizationContext> {
    let first = messages.first()?;
    let mut start = first.timestamp;
    let mut end = first.timestamp;
    let mut participants = Vec::new();
    let mut topics: HashMap<&str, usize> = HashMap::new();
    let mut entities: HashMap<&str, usize> = HashMap::new();
    let mut sentiments: HashMap<Sentiment, usize> = HashMap::new();

    for message in messages {
        start = start.min(message.timestamp);
        end = end.max(message.timestamp);
        if !participants.contains(&message.role) {
            participants.push(message.role);
        }
        for topic in &message.topics {
            *topics.entry(topic.as_str()).or_default() += 1;
        }
        for entity in &message.entities {
            *entities.entry(entity.as_str()).or_default() += 1;
        }
        *sentiments.entry(message.sentiment).or_default() += 1;
    }

    // Most frequent sentiment; ties resolve to neutral
    let count = |s: Sentiment| sentiments.get(&s).copied().unwrap_or(0);
    let (positive, negative, neutral) = (
        count(Sentiment::Positive),
        count(Sentiment::Negative),
        count(Sentiment::Neutral),
    );
    let dominant_sentiment = if positive > negative && positive > neutral {
        Sentiment::Positive
    } else if negative > positive && negative > neutral {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };

    Some(SummarizationContext {
        start,
        end,
        participants,
        key_topics: top_by_frequency(topics, KEY_TOPIC_LIMIT),
        important_entities: top_by_frequency(entities, ENTITY_LIMIT),
        dominant_sentiment,
        message_count: messages.len(),
        total_tokens: messages.iter().map(|m| m.token_count).sum(),
    })
}

/// Most frequent keys; ties broken alphabetically
fn top_by_frequency(counts: HashMap<&str, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(key, _)| key.to_string())
        .collect()
}

/// A topically and temporally coherent run of messages
#[derive(Debug, Clone)]
pub struct MessageCluster<'a> {
    pub messages: Vec<&'a EnhancedMessage>,
    pub topics: BTreeSet<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl<'a> MessageCluster<'a> {
    fn new(first: &'a EnhancedMessage) -> Self {
        Self {
            messages: vec![first],
            topics: first.topics.clone(),
            start: first.timestamp,
            end: first.timestamp,
        }
    }

    fn push(&mut self, message: &'a EnhancedMessage) {
        self.topics.extend(message.topics.iter().cloned());
        self.end = self.end.max(message.timestamp);
        self.messages.push(message);
    }

    /// Mean message importance
    pub fn importance(&self) -> f32 {
        if self.messages.is_empty() {
            return 0.0;
        }
        self.messages.iter().map(|m| m.importance).sum::<f32>() / self.messages.len() as f32
    }

    pub fn max_importance(&self) -> f32 {
        self.messages
            .iter()
            .map(|m| m.importance)
            .fold(0.0, f32::max)
    }

    /// Whether important messages of this cluster are kept verbatim
    pub fn preserve_fully(&self, threshold: f32) -> bool {
        self.importance() > threshold || self.max_importance() > 0.9
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn token_count(&self) -> usize {
        self.messages.iter().map(|m| m.token_count).sum()
    }

    /// Comma-separated topics, or "general"
    pub fn topic_label(&self) -> String {
        if self.topics.is_empty() {
            "general".to_string()
        } else {
            self.topics.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    }
}

/// Group chronological messages into clusters.
///
/// A new cluster starts when the gap since the previous message exceeds
/// `gap_minutes`, or when a message with topics overlaps the running cluster's
/// topics by less than `min_overlap`. Messages without topics never split a
/// cluster on their own.
pub fn cluster_messages(
    messages: &[EnhancedMessage],
    min_overlap: f32,
    gap_minutes: i64,
) -> Vec<MessageCluster<'_>> {
    let gap = Duration::minutes(gap_minutes);
    let mut clusters: Vec<MessageCluster<'_>> = Vec::new();

    for message in messages {
        let split = match clusters.last() {
            None => true,
            Some(current) => {
                let last = current.messages.last().map_or(current.end, |m| m.timestamp);
                let too_late = message.timestamp - last > gap;
                let drifted = !message.topics.is_empty()
                    && !current.topics.is_empty()
                    && jaccard(&message.topics, &current.topics) < min_overlap;
                too_late || drifted
            }
        };

        if split {
            clusters.push(MessageCluster::new(message));
        } else if let Some(current) = clusters.last_mut() {
            current.push(message);
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::MessageMetadata;

    fn message(
        id: &str,
        topics: &[&str],
        entities: &[&str],
        sentiment: Sentiment,
        at: DateTime<Utc>,
    ) -> EnhancedMessage {
        EnhancedMessage {
            id: id.to_string(),
            role: MessageRole::User,
            content: format!("content of {id}"),
            timestamp: at,
            token_count: 10,
            importance: 0.5,
            context_relevance: 0.5,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            entities: entities.iter().map(|e| e.to_string()).collect(),
            sentiment,
            metadata: MessageMetadata::default(),
        }
    }

    #[test]
    fn test_empty_context_is_none() {
        assert!(derive_context(&[]).is_none());
    }

    #[test]
    fn test_context_frequencies() {
        let now = Utc::now();
        let messages = vec![
            message("a", &["travel", "finance"], &["Paris"], Sentiment::Positive, now),
            message("b", &["travel"], &["Paris", "Rome"], Sentiment::Positive, now + Duration::minutes(1)),
            message("c", &["food"], &[], Sentiment::Neutral, now + Duration::minutes(2)),
        ];
        let context = derive_context(&messages).unwrap();
        assert_eq!(context.key_topics[0], "travel");
        assert_eq!(context.important_entities[0], "Paris");
        assert_eq!(context.dominant_sentiment, Sentiment::Positive);
        assert_eq!(context.message_count, 3);
        assert_eq!(context.total_tokens, 30);
        assert_eq!(context.end - context.start, Duration::minutes(2));
    }

    #[test]
    fn test_mostly_neutral_is_neutral() {
        let now = Utc::now();
        let messages = vec![
            message("a", &[], &[], Sentiment::Neutral, now),
            message("b", &[], &[], Sentiment::Neutral, now),
            message("c", &[], &[], Sentiment::Neutral, now),
            message("d", &[], &[], Sentiment::Neutral, now),
            message("e", &[], &[], Sentiment::Negative, now),
        ];
        assert_eq!(derive_context(&messages).unwrap().dominant_sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_clusters_split_on_topic_change() {
        let now = Utc::now();
        let messages = vec![
            message("a", &["travel"], &[], Sentiment::Neutral, now),
            message("b", &["travel", "planning"], &[], Sentiment::Neutral, now + Duration::minutes(1)),
            message("c", &["finance"], &[], Sentiment::Neutral, now + Duration::minutes(2)),
        ];
        let clusters = cluster_messages(&messages, 0.3, 30);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].messages.len(), 2);
        assert_eq!(clusters[1].messages[0].id, "c");
    }

    #[test]
    fn test_clusters_split_on_time_gap() {
        let now = Utc::now();
        let messages = vec![
            message("a", &["travel"], &[], Sentiment::Neutral, now),
            message("b", &["travel"], &[], Sentiment::Neutral, now + Duration::minutes(45)),
        ];
        assert_eq!(cluster_messages(&messages, 0.3, 30).len(), 2);
    }

    #[test]
    fn test_topicless_messages_join_current_cluster() {
        let now = Utc::now();
        let messages = vec![
            message("a", &["travel"], &[], Sentiment::Neutral, now),
            message("b", &[], &[], Sentiment::Neutral, now + Duration::minutes(1)),
            message("c", &["travel"], &[], Sentiment::Neutral, now + Duration::minutes(2)),
        ];
        let clusters = cluster_messages(&messages, 0.3, 30);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].duration_minutes(), 2);
    }

    #[test]
    fn test_preserve_fully() {
        let now = Utc::now();
        let mut messages = vec![
            message("a", &[], &[], Sentiment::Neutral, now),
            message("b", &[], &[], Sentiment::Neutral, now),
        ];
        let clusters = cluster_messages(&messages, 0.3, 30);
        assert!(!clusters[0].preserve_fully(0.7));

        messages[1].importance = 0.95;
        let clusters = cluster_messages(&messages, 0.3, 30);
        assert!(clusters[0].preserve_fully(0.7));
    }
}
