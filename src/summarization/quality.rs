//! Summary quality heuristics

use super::analysis::SummarizationContext;
use super::extractive::split_sentences;
use serde::{Deserialize, Serialize};

const TRANSITIONS: &[&str] = &[
    "however",
    "therefore",
    "then",
    "also",
    "additionally",
    "furthermore",
    "meanwhile",
    "finally",
    "first",
    "next",
    "because",
    "so",
    "but",
    "and",
    "afterwards",
    "later",
    "overall",
];

/// Quality scores of a summary, each in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryQuality {
    pub coherence: f32,
    pub completeness: f32,
    pub accuracy: f32,
    pub readability: f32,
    pub overall: f32,
}

impl SummaryQuality {
    /// Score `text` against the context it was produced from.
    ///
    /// `confidence` stands in for accuracy since there is no reference summary.
    pub fn assess(text: &str, context: &SummarizationContext, confidence: f32) -> Self {
        let coherence = coherence(text);
        let completeness = completeness(text, context);
        let accuracy = confidence.clamp(0.0, 1.0);
        let readability = readability(text);
        Self {
            coherence,
            completeness,
            accuracy,
            readability,
            overall: (coherence + completeness + accuracy + readability) / 4.0,
        }
    }
}

/// Share of sentence transitions introduced by a transition word
fn coherence(text: &str) -> f32 {
    let sentences = split_sentences(text);
    if sentences.len() <= 1 {
        return 1.0;
    }
    let linked = sentences[1..]
        .iter()
        .filter(|sentence| {
            sentence
                .split_whitespace()
                .take(3)
                .map(|w| {
                    w.trim_matches(|c: char| !c.is_alphanumeric())
                        .to_lowercase()
                })
                .any(|w| TRANSITIONS.contains(&w.as_str()))
        })
        .count();
    // 0.5 floor, 1.0 once half the transitions are linked
    (0.5 + linked as f32 / (sentences.len() - 1) as f32).min(1.0)
}

/// Share of key topics and entities mentioned in the summary
fn completeness(text: &str, context: &SummarizationContext) -> f32 {
    let expected = context.key_topics.len() + context.important_entities.len();
    if expected == 0 {
        return 1.0;
    }
    let lower = text.to_lowercase();
    let found = context
        .key_topics
        .iter()
        .chain(context.important_entities.iter())
        .filter(|item| lower.contains(&item.to_lowercase()))
        .count();
    found as f32 / expected as f32
}

/// Penalizes sentences outside 10-25 words and average word length outside 3-7
fn readability(text: &str) -> f32 {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return 0.0;
    }
    let in_band = sentences
        .iter()
        .filter(|s| (10..=25).contains(&s.split_whitespace().count()))
        .count();
    let mut score = 0.5 + 0.5 * (in_band as f32 / sentences.len() as f32);

    let words: Vec<&str> = text.split_whitespace().collect();
    let letters: usize = words
        .iter()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
        .sum();
    let average = letters as f32 / words.len().max(1) as f32;
    if !(3.0..=7.0).contains(&average) {
        score -= 0.2;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::Sentiment;
    use chrono::Utc;

    fn context(topics: &[&str], entities: &[&str]) -> SummarizationContext {
        SummarizationContext {
            start: Utc::now(),
            end: Utc::now(),
            participants: Vec::new(),
            key_topics: topics.iter().map(|t| t.to_string()).collect(),
            important_entities: entities.iter().map(|e| e.to_string()).collect(),
            dominant_sentiment: Sentiment::Neutral,
            message_count: 1,
            total_tokens: 10,
        }
    }

    #[test]
    fn test_completeness_counts_mentions() {
        let ctx = context(&["travel", "finance"], &["Paris", "Rome"]);
        let quality = SummaryQuality::assess(
            "The user planned travel to Paris and asked about flights there.",
            &ctx,
            0.8,
        );
        assert!((quality.completeness - 0.5).abs() < 1e-6);
        assert!((quality.accuracy - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_coherence_rewards_transitions() {
        let ctx = context(&[], &[]);
        let linked = SummaryQuality::assess(
            "The user asked about hotels. Then the assistant listed three options. Finally they booked one.",
            &ctx,
            0.5,
        );
        let unlinked = SummaryQuality::assess(
            "The user asked about hotels. The assistant listed three options. They booked one.",
            &ctx,
            0.5,
        );
        assert!(linked.coherence > unlinked.coherence);
        assert_eq!(linked.coherence, 1.0);
    }

    #[test]
    fn test_overall_is_mean() {
        let ctx = context(&["travel"], &[]);
        let q = SummaryQuality::assess("Travel plans were discussed at length by everyone involved today.", &ctx, 0.6);
        let mean = (q.coherence + q.completeness + q.accuracy + q.readability) / 4.0;
        assert!((q.overall - mean).abs() < 1e-6);
        assert!(q.overall > 0.0 && q.overall <= 1.0);
    }

    #[test]
    fn test_empty_text_is_unreadable() {
        let q = SummaryQuality::assess("", &context(&[], &[]), 0.0);
        assert_eq!(q.readability, 0.0);
    }
}
