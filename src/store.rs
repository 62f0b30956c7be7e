use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Durable key-value store: the only persistence primitive in the core.
///
/// Both the mutation queue and the TTL cache persist through this trait, so a
/// test can substitute [`MemoryStore`] and a device uses [`FileStore`]. Values
/// are JSON blobs; the store treats them as opaque strings.
///
/// All three operations may fail on the storage layer; such errors propagate
/// to the caller and are never retried internally.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// One-file-per-key store rooted at a directory.
///
/// Keys are namespaced strings containing `/`, so each key is encoded as
/// URL-safe base64 (no padding) to produce a flat, filesystem-safe filename.
/// The encoding is stable across restarts, which is what makes the queue and
/// cache durable.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Opens the store at the platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::new(crate::config::data_dir()?.join("store"))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", URL_SAFE_NO_PAD.encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read store entry: {}", path.display()))
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key);
        tokio::fs::write(&path, value)
            .await
            .with_context(|| format!("Failed to write store entry: {}", path.display()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove store entry: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();

        assert_eq!(store.get("sync/queue").await.unwrap(), None);

        store.set("sync/queue", "[1,2,3]").await.unwrap();
        assert_eq!(
            store.get("sync/queue").await.unwrap(),
            Some("[1,2,3]".to_string())
        );

        store.remove("sync/queue").await.unwrap();
        assert_eq!(store.get("sync/queue").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_remove_absent_key_is_ok() {
        let store = MemoryStore::new();
        store.remove("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.set("cache/workers", r#"{"rows":[]}"#).await.unwrap();
        assert_eq!(
            store.get("cache/workers").await.unwrap(),
            Some(r#"{"rows":[]}"#.to_string())
        );

        store.remove("cache/workers").await.unwrap();
        assert_eq!(store.get("cache/workers").await.unwrap(), None);
        store.remove("cache/workers").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_namespaced_keys_map_to_flat_filenames() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.set("sync/pending-operations", "{}").await.unwrap();
        store.set("cache/training/sessions", "[]").await.unwrap();

        // No subdirectories are created, only encoded files.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.path().is_file()));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::new(dir.path()).unwrap();
            store.set("sync/pending-operations", "persisted").await.unwrap();
        }
        let reopened = FileStore::new(dir.path()).unwrap();
        assert_eq!(
            reopened.get("sync/pending-operations").await.unwrap(),
            Some("persisted".to_string())
        );
    }
}
