//! Bounded background writer

use super::{ContextStore, WindowState};
use crate::metrics::METRICS;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum Job {
    Save(Box<WindowState>),
    Delete(String),
    Flush(oneshot::Sender<()>),
}

/// Queue in front of a [`ContextStore`].
///
/// Saves are fire-and-forget: when the queue is full the save is dropped
/// and counted, and store errors are logged. Jobs run in submission order.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: mpsc::Sender<Job>,
}

impl PersistenceWriter {
    /// Start the writer task; must be called inside a tokio runtime
    pub fn spawn(store: Arc<dyn ContextStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run(store, rx));
        Self { tx }
    }

    /// Queue a save without waiting
    pub fn save(&self, state: WindowState) {
        let id = state.conversation_id.clone();
        match self.tx.try_send(Job::Save(Box::new(state))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Persistence queue full, dropping save for {}", id);
                METRICS.record_persistence_dropped();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Persistence writer stopped, dropping save for {}", id);
                METRICS.record_persistence_dropped();
            }
        }
    }

    /// Queue a delete behind any pending saves for the same id
    pub async fn delete(&self, conversation_id: impl Into<String>) {
        let id = conversation_id.into();
        if self.tx.send(Job::Delete(id.clone())).await.is_err() {
            warn!("Persistence writer stopped, dropping delete for {}", id);
        }
    }

    /// Wait until every job queued before this call has run
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Job::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run(store: Arc<dyn ContextStore>, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Save(state) => match store.save(&state).await {
                Ok(()) => debug!("Persisted conversation {}", state.conversation_id),
                Err(e) => {
                    warn!(
                        "Failed to persist conversation {}: {}",
                        state.conversation_id, e
                    );
                    METRICS.record_persistence_failure("save");
                }
            },
            Job::Delete(id) => {
                if let Err(e) = store.delete(&id).await {
                    warn!("Failed to delete conversation {}: {}", id, e);
                    METRICS.record_persistence_failure("delete");
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Persistence writer stopped");
}
