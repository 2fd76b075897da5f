//! Durable Store - atomic load/save of one JSON document per file.
//!
//! Every service serializes its whole collection through this primitive.
//! Saves go to a temp file in the same directory, are flushed to disk, and
//! then renamed over the final path, so concurrent readers either see the
//! old document or the new one, never a partial write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Type-agnostic handle to one backing file.
#[derive(Debug, Clone)]
pub struct DurableStore {
    path: PathBuf,
}

impl DurableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored document.
    ///
    /// A missing file, an unreadable file, and a corrupt file all yield
    /// `None`: callers fall back to their empty state instead of failing
    /// the request. Corruption is logged so it is not silently absorbed.
    pub async fn load<T: DeserializeOwned>(&self) -> Option<T> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Corrupt document in {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Save the document atomically.
    ///
    /// Write failures propagate: masking them would risk silent data loss.
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(value)?;

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        // rename() replaces the destination in one step on Unix. Where the
        // platform refuses to replace an existing file, fall back to
        // delete-then-move.
        if let Err(rename_err) = fs::rename(&tmp, &self.path).await {
            if fs::try_exists(&self.path).await.unwrap_or(false) {
                fs::remove_file(&self.path).await?;
                fs::rename(&tmp, &self.path).await?;
            } else {
                return Err(rename_err.into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn temp_store(file: &str) -> DurableStore {
        let dir = std::env::temp_dir().join(format!("portfolio-store-{}", uuid::Uuid::new_v4()));
        DurableStore::new(dir.join(file))
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_none() {
        let store = temp_store("missing.json");
        let loaded: Option<Doc> = store.load().await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let store = temp_store("doc.json");
        let doc = Doc {
            name: "hello".to_string(),
            count: 7,
        };
        store.save(&doc).await.unwrap();
        let loaded: Doc = store.load().await.unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_save_replaces_existing_document() {
        let store = temp_store("doc.json");
        store
            .save(&Doc {
                name: "first".to_string(),
                count: 1,
            })
            .await
            .unwrap();
        store
            .save(&Doc {
                name: "second".to_string(),
                count: 2,
            })
            .await
            .unwrap();
        let loaded: Doc = store.load().await.unwrap();
        assert_eq!(loaded.name, "second");
    }

    #[tokio::test]
    async fn test_load_corrupt_file_fails_open() {
        let store = temp_store("corrupt.json");
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), b"{ not json at all")
            .await
            .unwrap();
        let loaded: Option<Doc> = store.load().await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_interrupted_write_leaves_original_intact() {
        let store = temp_store("doc.json");
        let doc = Doc {
            name: "stable".to_string(),
            count: 42,
        };
        store.save(&doc).await.unwrap();

        // A crash between temp-write and rename leaves a stray .tmp file
        // behind; the published document must stay fully readable.
        let tmp = store.path().with_extension("tmp");
        tokio::fs::write(&tmp, b"partial garba").await.unwrap();

        let loaded: Doc = store.load().await.unwrap();
        assert_eq!(loaded, doc);
    }
}
