//! Context window algorithms
//!
//! Pure, synchronous operations on a [`ContextWindow`]: appending, selecting
//! summarization candidates, pruning by importance and projecting the window
//! into a model-ready sequence. The async parts of optimization (summarizing
//! candidates) live in the context manager.

use super::models::{
    ContextSummary, ContextWindow, EnhancedMessage, MessageRole, ModelMessage, WindowMetadata,
};
use super::token_estimator::TokenEstimator;
use crate::config::WindowConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Why an optimization pass is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeTrigger {
    MessageCount,
    TokenBudget,
    Forced,
}

/// `floor(count * ratio)`, tolerant of f32 representation error
pub fn scaled(count: usize, ratio: f32) -> usize {
    ((count as f64) * (ratio as f64) + 1e-6).floor() as usize
}

impl ContextWindow {
    /// Create an empty window sized from configuration
    pub fn new(conversation_id: impl Into<String>, config: &WindowConfig) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            summary: None,
            token_count: 0,
            max_window_size: config.max_window_size,
            max_tokens: config.max_tokens,
            metadata: WindowMetadata::new(Utc::now()),
        }
    }

    /// Most recent message
    pub fn last_message(&self) -> Option<&EnhancedMessage> {
        self.messages.last()
    }

    /// Up to `n` most recent messages, chronological
    pub fn recent(&self, n: usize) -> &[EnhancedMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Append a message and update running counts
    pub fn push(&mut self, message: EnhancedMessage) {
        self.token_count += message.token_count;
        self.metadata.tokens_ingested += message.token_count;
        self.metadata.messages_ingested += 1;
        self.metadata.last_updated = Utc::now();
        self.messages.push(message);
        self.update_average();
    }

    /// Recompute the token count as message tokens plus summary tokens
    pub fn recalculate_tokens(&mut self) {
        let message_tokens: usize = self.messages.iter().map(|m| m.token_count).sum();
        let summary_tokens = self.summary.as_ref().map_or(0, |s| s.token_count);
        self.token_count = message_tokens + summary_tokens;
        self.update_average();
    }

    fn update_average(&mut self) {
        self.metadata.average_tokens_per_message = if self.messages.is_empty() {
            0.0
        } else {
            let tokens: usize = self.messages.iter().map(|m| m.token_count).sum();
            tokens as f32 / self.messages.len() as f32
        };
    }

    /// First trigger that calls for optimization, if any
    pub fn optimization_trigger(&self, config: &WindowConfig) -> Option<OptimizeTrigger> {
        if self.messages.len() > self.max_window_size {
            Some(OptimizeTrigger::MessageCount)
        } else if self.token_count > self.usable_tokens(config) {
            Some(OptimizeTrigger::TokenBudget)
        } else {
            None
        }
    }

    /// Budget for conversation content, leaving room for the response
    pub fn usable_tokens(&self, config: &WindowConfig) -> usize {
        self.max_tokens.saturating_sub(config.token_buffer)
    }

    /// Indices of messages eligible for summarization.
    ///
    /// Only messages older than the most recent `summarize_ratio` share of the
    /// window qualify, and never highly important messages, fresh tool results
    /// or messages that started a branch.
    pub fn summarization_candidates(&self, config: &WindowConfig, now: DateTime<Utc>) -> Vec<usize> {
        let keep_recent = scaled(self.max_window_size, config.summarize_ratio);
        let eligible = self.messages.len().saturating_sub(keep_recent);
        let protection = config.tool_result_protection_secs as i64;

        self.messages[..eligible]
            .iter()
            .enumerate()
            .filter(|(_, m)| m.importance <= config.importance_threshold)
            .filter(|(_, m)| !(m.role == MessageRole::ToolResult && m.age_secs(now) < protection))
            .filter(|(_, m)| !m.metadata.context_switch)
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove the messages at `indices`, returning them in chronological order
    pub fn take_messages(&mut self, indices: &[usize]) -> Vec<EnhancedMessage> {
        let selected: BTreeSet<usize> = indices.iter().copied().collect();
        let mut taken = Vec::with_capacity(selected.len());
        let mut kept = Vec::with_capacity(self.messages.len() - selected.len().min(self.messages.len()));
        for (i, message) in std::mem::take(&mut self.messages).into_iter().enumerate() {
            if selected.contains(&i) {
                taken.push(message);
            } else {
                kept.push(message);
            }
        }
        self.messages = kept;
        taken
    }

    /// Replace the current summary
    pub fn set_summary(&mut self, summary: ContextSummary) {
        self.summary = Some(summary);
    }

    /// Keep the `prune_ratio` share of the window with the highest decayed
    /// importance, always keeping the `recency_floor` most recent messages.
    /// Chronological order is preserved. Returns the number of dropped messages.
    pub fn prune_by_importance(&mut self, config: &WindowConfig, now: DateTime<Utc>) -> usize {
        let keep = scaled(self.max_window_size, config.prune_ratio).max(1);
        let total = self.messages.len();
        if total <= keep {
            return 0;
        }

        let floor = config.recency_floor.min(total);
        let recent_start = total - floor;
        let half_life = config.importance_half_life_hours;

        let mut ranked: Vec<(usize, f32)> = self.messages[..recent_start]
            .iter()
            .enumerate()
            .map(|(i, m)| (i, m.importance_at(now, half_life)))
            .collect();
        // Highest importance first; newer wins ties
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.cmp(&a.0))
        });

        let slots = keep.saturating_sub(floor);
        let mut kept: BTreeSet<usize> = ranked.into_iter().take(slots).map(|(i, _)| i).collect();
        kept.extend(recent_start..total);

        let dropped: Vec<usize> = (0..total).filter(|i| !kept.contains(i)).collect();
        self.take_messages(&dropped);
        debug!(
            "Pruned {} messages by importance ({} kept)",
            dropped.len(),
            self.messages.len()
        );
        dropped.len()
    }

    /// Build the model-ready sequence within `max_tokens - token_buffer`.
    ///
    /// The summary, if any and if it fits, leads as a system message. Messages
    /// are then taken from newest to oldest, stopping at the first that would
    /// overflow. Read-only.
    pub fn model_context(
        &self,
        config: &WindowConfig,
        estimator: &dyn TokenEstimator,
    ) -> Vec<ModelMessage> {
        let budget = self.usable_tokens(config);
        let mut used = 0usize;

        let summary_message = self
            .summary
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| {
                let content = format!("Summary of earlier conversation: {}", s.text);
                let token_count = estimator.estimate(&content);
                ModelMessage {
                    role: MessageRole::System,
                    content,
                    token_count,
                }
            })
            .filter(|m| m.token_count <= budget);
        if let Some(message) = &summary_message {
            used += message.token_count;
        }

        let mut selected = Vec::new();
        for message in self.messages.iter().rev() {
            if used + message.token_count > budget {
                break;
            }
            used += message.token_count;
            selected.push(ModelMessage {
                role: message.role,
                content: message.content.clone(),
                token_count: message.token_count,
            });
        }
        selected.reverse();

        summary_message.into_iter().chain(selected).collect()
    }

    /// Union of all message topics
    pub fn topics(&self) -> BTreeSet<String> {
        self.messages
            .iter()
            .flat_map(|m| m.topics.iter().cloned())
            .collect()
    }

    pub fn average_importance(&self) -> f32 {
        if self.messages.is_empty() {
            return 0.0;
        }
        self.messages.iter().map(|m| m.importance).sum::<f32>() / self.messages.len() as f32
    }

    /// Timestamps are non-decreasing
    pub fn is_chronological(&self) -> bool {
        self.messages
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    /// Close an optimization pass: recount tokens and bump counters
    pub fn finish_optimization(&mut self) {
        self.recalculate_tokens();
        self.metadata.optimization_count += 1;
        self.metadata.last_updated = Utc::now();
    }
}
