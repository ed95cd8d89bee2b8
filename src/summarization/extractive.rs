//! Extractive summarization: keep the most representative text verbatim

use super::analysis::MessageCluster;
use crate::context::enhancer::TopicExtractor;
use crate::context::models::EnhancedMessage;
use crate::context::token_estimator::TokenEstimator;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Knobs and collaborators for one extraction
pub struct ExtractParams<'a> {
    pub preserve_threshold: f32,
    pub target_tokens: usize,
    /// Cap on messages taken from each cluster
    pub per_cluster_limit: Option<usize>,
    pub estimator: &'a dyn TokenEstimator,
    pub topics: &'a dyn TopicExtractor,
}

/// Result of an extraction
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    /// Messages that contributed text
    pub covered: usize,
    /// Messages considered
    pub considered: usize,
}

impl Extraction {
    /// Share of considered messages represented in the text
    pub fn coverage(&self) -> f32 {
        if self.considered == 0 {
            return 0.0;
        }
        self.covered as f32 / self.considered as f32
    }

    /// Confidence grows with coverage
    pub fn confidence(&self) -> f32 {
        if self.text.is_empty() {
            return 0.0;
        }
        0.5 + 0.5 * self.coverage()
    }
}

/// Split text into trimmed sentences at `.`, `!` and `?`
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (pos, &(i, c)) in chars.iter().enumerate() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars
                .get(pos + 1)
                .map_or(true, |&(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Score a sentence for extraction.
///
/// Rewards sentences touching the cluster's topics, the opening sentence and
/// questions; penalizes fragments and run-ons.
pub fn score_sentence(
    sentence: &str,
    position: usize,
    cluster_topics: &BTreeSet<String>,
    topics: &dyn TopicExtractor,
) -> f32 {
    let mut score = 0.0f32;
    let matched = topics
        .extract(sentence)
        .intersection(cluster_topics)
        .count();
    score += (matched as f32 * 0.3).min(0.6);
    if position == 0 {
        score += 0.2;
    }
    if sentence.contains('?') {
        score += 0.1;
    }
    let words = sentence.split_whitespace().count();
    if words < 4 {
        score -= 0.2;
    }
    if words > 40 {
        score -= 0.2;
    }
    score
}

/// The highest-scoring sentence of a message; earliest wins ties
pub fn best_sentence(
    message: &EnhancedMessage,
    cluster_topics: &BTreeSet<String>,
    topics: &dyn TopicExtractor,
) -> Option<String> {
    split_sentences(&message.content)
        .into_iter()
        .enumerate()
        .map(|(i, s)| (score_sentence(s, i, cluster_topics, topics), i, s))
        .max_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
        })
        .map(|(_, _, s)| s.to_string())
}

/// Truncate text to roughly `max_tokens` by dropping trailing words
pub fn truncate_to_tokens(text: &str, max_tokens: usize, estimator: &dyn TokenEstimator) -> String {
    if estimator.estimate(text) <= max_tokens {
        return text.to_string();
    }
    let mut out = String::new();
    for word in text.split_whitespace() {
        let candidate = if out.is_empty() {
            word.to_string()
        } else {
            format!("{out} {word}")
        };
        if estimator.estimate(&format!("{candidate}...")) > max_tokens {
            break;
        }
        out = candidate;
    }
    if out.is_empty() {
        out
    } else {
        format!("{out}...")
    }
}

/// Extract text from clusters until the token target is reached.
///
/// Clusters are visited by importance. Important messages in clusters marked
/// preserve-fully are kept whole; every other message contributes its single
/// best sentence. The output is reassembled in chronological order.
pub fn extract(clusters: &[MessageCluster<'_>], params: &ExtractParams<'_>) -> Extraction {
    let mut ranked: Vec<&MessageCluster<'_>> = clusters.iter().collect();
    ranked.sort_by(|a, b| {
        b.importance()
            .partial_cmp(&a.importance())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let considered = clusters.iter().map(|c| c.messages.len()).sum();
    let mut pieces: Vec<(DateTime<Utc>, String)> = Vec::new();
    let mut used = 0usize;

    'clusters: for cluster in ranked {
        let preserve = cluster.preserve_fully(params.preserve_threshold);

        let mut members: Vec<&EnhancedMessage> = cluster.messages.clone();
        if let Some(limit) = params.per_cluster_limit {
            members.sort_by(|a, b| {
                b.importance
                    .partial_cmp(&a.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            members.truncate(limit);
            members.sort_by_key(|m| m.timestamp);
        }

        for message in members {
            let body = if preserve && message.importance > params.preserve_threshold {
                Some(message.content.trim().to_string())
            } else {
                best_sentence(message, &cluster.topics, params.topics)
            };
            let Some(body) = body.filter(|b| !b.is_empty()) else {
                continue;
            };

            let piece = format!("{}: {}", capitalize(message.role.as_str()), body);
            let tokens = params.estimator.estimate(&piece);
            if used + tokens > params.target_tokens {
                if pieces.is_empty() && params.target_tokens > 0 {
                    let truncated = truncate_to_tokens(&piece, params.target_tokens, params.estimator);
                    if !truncated.is_empty() {
                        pieces.push((message.timestamp, truncated));
                    }
                }
                break 'clusters;
            }
            used += tokens;
            pieces.push((message.timestamp, piece));
        }
    }

    pieces.sort_by_key(|(at, _)| *at);
    let covered = pieces.len();
    Extraction {
        text: pieces
            .into_iter()
            .map(|(_, p)| p)
            .collect::<Vec<_>>()
            .join(" "),
        covered,
        considered,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
