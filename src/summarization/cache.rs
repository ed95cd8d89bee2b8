//! Per-conversation summary cache

use super::SummarizationStrategy;
use crate::context::models::{ContextSummary, EnhancedMessage};
use moka::future::Cache;
use sha2::{Digest, Sha256};

/// Memoizes summaries by a fingerprint of their inputs.
///
/// Owned by a single conversation; never shared across conversations.
#[derive(Clone)]
pub struct SummaryCache {
    entries: Cache<String, ContextSummary>,
}

impl SummaryCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity.max(1)).build(),
        }
    }

    /// Stable key over message ids, an optional previous summary and the strategy
    pub fn fingerprint(
        messages: &[EnhancedMessage],
        previous: Option<&ContextSummary>,
        strategy: SummarizationStrategy,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(strategy.as_str().as_bytes());
        if let Some(previous) = previous {
            hasher.update(b"|prev:");
            hasher.update(previous.id.as_bytes());
        }
        for message in messages {
            hasher.update(b"|");
            hasher.update(message.id.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub async fn get(&self, key: &str) -> Option<ContextSummary> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: String, summary: ContextSummary) {
        self.entries.insert(key, summary).await;
    }

    /// Number of cached summaries
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, for persistence
    pub fn snapshot(&self) -> Vec<(String, ContextSummary)> {
        let mut entries: Vec<(String, ContextSummary)> = self
            .entries
            .iter()
            .map(|(key, summary)| (key.as_ref().clone(), summary))
            .collect();
        entries.sort_by_key(|(_, summary)| summary.created_at);
        entries
    }

    /// Load persisted entries
    pub async fn restore(&self, entries: Vec<(String, ContextSummary)>) {
        for (key, summary) in entries {
            self.entries.insert(key, summary).await;
        }
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
