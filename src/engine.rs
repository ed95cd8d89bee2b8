//! Conversation multiplexing
//!
//! Each conversation id maps to one [`ContextManager`] behind an async mutex,
//! so operations on the same conversation run one at a time while different
//! conversations proceed concurrently. Managers left idle are dropped from
//! memory and reload from the store on next use.

use crate::config::Config;
use crate::context::{ContextManager, ContextServices};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub type SharedManager = Arc<Mutex<ContextManager>>;

struct Slot {
    manager: SharedManager,
    last_used: Instant,
}

#[derive(Clone)]
pub struct ContextEngine {
    services: ContextServices,
    conversations: Arc<DashMap<String, Slot>>,
}

impl ContextEngine {
    pub fn new(services: ContextServices) -> Self {
        Self {
            services,
            conversations: Arc::new(DashMap::new()),
        }
    }

    /// Engine with the model client and store named in `config`
    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Self::new(ContextServices::from_config(config)?))
    }

    pub fn config(&self) -> &Config {
        &self.services.config
    }

    /// Manager for `conversation_id`, created uninitialized on first use
    pub fn conversation(&self, conversation_id: &str) -> SharedManager {
        if let Some(mut existing) = self.conversations.get_mut(conversation_id) {
            existing.last_used = Instant::now();
            return existing.manager.clone();
        }
        let mut slot = self
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!("Opening conversation {}", conversation_id);
                Slot {
                    manager: Arc::new(Mutex::new(ContextManager::new(
                        conversation_id,
                        self.services.clone(),
                    ))),
                    last_used: Instant::now(),
                }
            });
        slot.last_used = Instant::now();
        slot.manager.clone()
    }

    /// Drop the in-memory manager; persisted state is untouched
    pub fn evict(&self, conversation_id: &str) -> bool {
        self.conversations.remove(conversation_id).is_some()
    }

    /// Drop managers unused for at least `max_idle`.
    ///
    /// A manager still referenced by a caller is kept, so an in-flight
    /// request never loses its conversation. Returns the number evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<String> = self
            .conversations
            .iter()
            .filter(|entry| entry.last_used.elapsed() >= max_idle)
            .map(|entry| entry.key().clone())
            .collect();

        let evicted = idle
            .iter()
            .filter(|id| {
                self.conversations
                    .remove_if(id.as_str(), |_, slot| {
                        slot.last_used.elapsed() >= max_idle
                            && Arc::strong_count(&slot.manager) == 1
                    })
                    .is_some()
            })
            .count();
        if evicted > 0 {
            info!("Evicted {} idle conversations", evicted);
        }
        evicted
    }

    /// Periodically evict conversations idle for `max_idle`
    pub fn spawn_idle_sweeper(&self, max_idle: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        let period = max_idle.min(Duration::from_secs(60)).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                engine.evict_idle(max_idle);
            }
        })
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Wait for pending persistence writes
    pub async fn flush(&self) {
        self.services.writer.flush().await;
    }
}
