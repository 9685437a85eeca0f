//! Checkpoint store: persisted node outputs keyed by execution and node.
//!
//! When a schema requires checkpointing, the runtime persists every node's
//! outputs after completion. On resume, persisted nodes are skipped and
//! downstream scheduling is rebuilt from the stored state.

use crate::error::{WorkflowError, WorkflowResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Narrow key-value contract so backends can be in-memory, on disk, or
/// remote.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn put(&self, execution_id: &str, node_key: &str, bytes: Vec<u8>)
        -> WorkflowResult<()>;
    async fn get(&self, execution_id: &str, node_key: &str) -> WorkflowResult<Option<Vec<u8>>>;
    /// All node keys checkpointed for an execution.
    async fn list(&self, execution_id: &str) -> WorkflowResult<Vec<String>>;
    async fn clear(&self, execution_id: &str) -> WorkflowResult<()>;
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: tokio::sync::RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> MemoryCheckpointStore {
        MemoryCheckpointStore::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(
        &self,
        execution_id: &str,
        node_key: &str,
        bytes: Vec<u8>,
    ) -> WorkflowResult<()> {
        self.data
            .write()
            .await
            .entry(execution_id.to_string())
            .or_default()
            .insert(node_key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, execution_id: &str, node_key: &str) -> WorkflowResult<Option<Vec<u8>>> {
        Ok(self
            .data
            .read()
            .await
            .get(execution_id)
            .and_then(|m| m.get(node_key))
            .cloned())
    }

    async fn list(&self, execution_id: &str) -> WorkflowResult<Vec<String>> {
        Ok(self
            .data
            .read()
            .await
            .get(execution_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, execution_id: &str) -> WorkflowResult<()> {
        self.data.write().await.remove(execution_id);
        Ok(())
    }
}

/// One file per `(execution, node)` under a base directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> WorkflowResult<FileCheckpointStore> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| WorkflowError::OperationFail(format!("checkpoint dir: {e}")))?;
        Ok(FileCheckpointStore { dir })
    }

    fn exec_dir(&self, execution_id: &str) -> PathBuf {
        self.dir.join(execution_id)
    }

    fn path_for(&self, execution_id: &str, node_key: &str) -> PathBuf {
        self.exec_dir(execution_id).join(format!("{node_key}.ckpt"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(
        &self,
        execution_id: &str,
        node_key: &str,
        bytes: Vec<u8>,
    ) -> WorkflowResult<()> {
        let dir = self.exec_dir(execution_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| WorkflowError::OperationFail(format!("checkpoint dir: {e}")))?;
        tokio::fs::write(self.path_for(execution_id, node_key), bytes)
            .await
            .map_err(|e| WorkflowError::OperationFail(format!("checkpoint write: {e}")))
    }

    async fn get(&self, execution_id: &str, node_key: &str) -> WorkflowResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(execution_id, node_key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkflowError::OperationFail(format!("checkpoint read: {e}"))),
        }
    }

    async fn list(&self, execution_id: &str) -> WorkflowResult<Vec<String>> {
        let mut out = Vec::new();
        let mut dir = match tokio::fs::read_dir(self.exec_dir(execution_id)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(WorkflowError::OperationFail(format!("checkpoint list: {e}"))),
        };
        while let Ok(Some(entry)) = dir.next_entry().await.map_err(|e| {
            WorkflowError::OperationFail(format!("checkpoint list: {e}"))
        }) {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".ckpt") {
                    out.push(stem.to_string());
                }
            }
        }
        Ok(out)
    }

    async fn clear(&self, execution_id: &str) -> WorkflowResult<()> {
        let _ = tokio::fs::remove_dir_all(self.exec_dir(execution_id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCheckpointStore::new();
        store.put("e1", "n1", b"one".to_vec()).await.unwrap();
        store.put("e1", "n2", b"two".to_vec()).await.unwrap();

        assert_eq!(store.get("e1", "n1").await.unwrap(), Some(b"one".to_vec()));
        let mut keys = store.list("e1").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["n1".to_string(), "n2".to_string()]);

        store.clear("e1").await.unwrap();
        assert!(store.get("e1", "n1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        store.put("e1", "n1", b"bytes".to_vec()).await.unwrap();

        assert_eq!(store.get("e1", "n1").await.unwrap(), Some(b"bytes".to_vec()));
        assert_eq!(store.list("e1").await.unwrap(), vec!["n1".to_string()]);
        assert!(store.get("e2", "n1").await.unwrap().is_none());

        store.clear("e1").await.unwrap();
        assert!(store.list("e1").await.unwrap().is_empty());
    }
}
