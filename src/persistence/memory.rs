//! In-process store

use super::{ContextStore, WindowState};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Keeps state in a concurrent map; lost on restart
#[derive(Default)]
pub struct MemoryStore {
    states: DashMap<String, WindowState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn save(&self, state: &WindowState) -> Result<()> {
        self.states
            .insert(state.conversation_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<WindowState>> {
        Ok(self.states.get(conversation_id).map(|s| s.value().clone()))
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        self.states.remove(conversation_id);
        Ok(())
    }
}
