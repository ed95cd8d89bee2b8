//! Persistence of conversation state
//!
//! State is keyed by conversation id and written through a bounded,
//! fire-and-forget [`PersistenceWriter`] so a slow or failing backend never
//! stalls a conversation turn. Loads are awaited.

pub mod file;
pub mod memory;
pub mod writer;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use writer::PersistenceWriter;

use crate::branching::BranchTree;
use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::context::models::ContextSummary;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bumped whenever the persisted layout changes
pub const STATE_VERSION: u32 = 1;

/// Everything persisted for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowState {
    pub conversation_id: String,
    pub version: u32,
    /// All branches, each with its window
    pub tree: BranchTree,
    pub summary_cache: Vec<(String, ContextSummary)>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_branch_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
}

/// Key-value persistence surface keyed by conversation id
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn save(&self, state: &WindowState) -> Result<()>;

    /// `None` when nothing is stored for the id
    async fn load(&self, conversation_id: &str) -> Result<Option<WindowState>>;

    /// Deleting a missing id succeeds
    async fn delete(&self, conversation_id: &str) -> Result<()>;
}

/// Build the backend selected in configuration
pub fn build_store(config: &PersistenceConfig) -> Arc<dyn ContextStore> {
    match config.backend {
        PersistenceBackend::Memory => Arc::new(MemoryStore::new()),
        PersistenceBackend::File => Arc::new(FileStore::new(config.directory.clone())),
    }
}
