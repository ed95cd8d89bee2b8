//! MessagePack files, one per conversation

use super::{ContextStore, WindowState, STATE_VERSION};
use crate::error::{ContextError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Ids that are not plain file names are hashed
    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let plain = !conversation_id.is_empty()
            && conversation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let name = if plain {
            conversation_id.to_string()
        } else {
            hex::encode(Sha256::digest(conversation_id.as_bytes()))
        };
        self.directory.join(format!("{name}.msgpack"))
    }
}

#[async_trait]
impl ContextStore for FileStore {
    async fn save(&self, state: &WindowState) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(state)
            .map_err(|e| ContextError::Serialization(e.to_string()))?;
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| ContextError::Persistence(e.to_string()))?;

        // Write then rename so readers never see a partial file
        let path = self.path_for(&state.conversation_id);
        let tmp = path.with_extension("msgpack.tmp");
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ContextError::Persistence(e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| ContextError::Persistence(e.to_string()))?;
        debug!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<WindowState>> {
        let path = self.path_for(conversation_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ContextError::Persistence(e.to_string())),
        };
        let state: WindowState = rmp_serde::from_slice(&bytes)
            .map_err(|e| ContextError::Serialization(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(ContextError::Persistence(format!(
                "unsupported state version {} in {}",
                state.version,
                path.display()
            )));
        }
        Ok(Some(state))
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        match fs::remove_file(self.path_for(conversation_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ContextError::Persistence(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branching::BranchTree;
    use crate::config::WindowConfig;
    use crate::context::models::ContextWindow;
    use chrono::Utc;

    fn state(id: &str) -> WindowState {
        WindowState {
            conversation_id: id.to_string(),
            version: STATE_VERSION,
            tree: BranchTree::new(ContextWindow::new(id, &WindowConfig::default())),
            summary_cache: Vec::new(),
            last_branch_at: None,
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("contexts"));

        assert!(store.load("conv-1").await.unwrap().is_none());
        store.save(&state("conv-1")).await.unwrap();

        let loaded = store.load("conv-1").await.unwrap().unwrap();
        assert_eq!(loaded.conversation_id, "conv-1");
        assert_eq!(loaded.tree.len(), 1);

        store.delete("conv-1").await.unwrap();
        assert!(store.load("conv-1").await.unwrap().is_none());
        store.delete("conv-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_unsafe_ids_are_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.path_for("../../etc/passwd");
        assert_eq!(path.parent(), Some(dir.path()));

        store.save(&state("../../etc/passwd")).await.unwrap();
        assert!(store.load("../../etc/passwd").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        tokio::fs::write(dir.path().join("bad.msgpack"), b"not msgpack")
            .await
            .unwrap();
        assert!(matches!(
            store.load("bad").await,
            Err(ContextError::Serialization(_))
        ));
    }
}
