//! Durable key-value storage for client state.
//!
//! Holds the bearer token and the photo cache between runs. Two backends:
//!
//! - [`MemoryStore`]: process-local, for tests and embedding
//! - [`FileStore`]: one JSON document per API origin on disk
//!
//! Reads and writes are atomic per key; there is no cross-key transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;
use url::Url;

/// Key under which the bearer token is stored.
pub const TOKEN_KEY: &str = "token";

/// Key under which the profile photo cache is stored.
pub const PHOTO_CACHE_KEY: &str = "profile_photos_cache";

/// Backend trait for durable client storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value, overwriting any previous one.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removes a key. Returns whether it existed; removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<bool>;
}

/// In-memory store. All data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> anyhow::Error {
        anyhow::anyhow!("memory store lock poisoned")
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.read().map_err(|_| Self::poisoned())?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        Ok(data.remove(key).is_some())
    }
}

/// File-backed store: a JSON object of string values.
///
/// Every operation re-reads the file, so separate processes sharing the file
/// see each other's writes. Writes go to a temporary file that is then renamed
/// over the original.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store for the origin of `base_url`, inside `dir`.
    ///
    /// `http://127.0.0.1:8000/api` maps to `<dir>/127_0_0_1_8000.json`.
    pub fn for_origin<P: AsRef<Path>>(dir: P, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).with_context(|| format!("invalid API url {}", base_url))?;
        let host = url
            .host_str()
            .with_context(|| format!("API url {} has no host", base_url))?;
        let port = url.port_or_known_default().unwrap_or(0);

        let origin: String = format!("{}_{}", host, port)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        Ok(Self::new(dir.as_ref().join(format!("{}.json", origin))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt store file {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    async fn save(&self, data: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(data)?)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        data.insert(key.to_string(), value);
        self.save(&data).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        if data.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&data).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);

        store.set(TOKEN_KEY, "abc".to_string()).await.unwrap();
        assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("abc"));

        store.set(TOKEN_KEY, "def".to_string()).await.unwrap();
        assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("def"));

        assert!(store.remove(TOKEN_KEY).await.unwrap());
        assert!(!store.remove(TOKEN_KEY).await.unwrap());
        assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileStore::new(dir.path().join("nested/store.json"))).await;
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        FileStore::new(&path)
            .set(TOKEN_KEY, "persisted".to_string())
            .await
            .unwrap();
        FileStore::new(&path)
            .set(PHOTO_CACHE_KEY, "{}".to_string())
            .await
            .unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(TOKEN_KEY).await.unwrap().as_deref(),
            Some("persisted")
        );
        assert_eq!(reopened.get(PHOTO_CACHE_KEY).await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileStore::new(&path).get(TOKEN_KEY).await.is_err());
    }

    #[test]
    fn test_file_store_for_origin() {
        let store = FileStore::for_origin("/tmp/dm", "http://127.0.0.1:8000/api").unwrap();
        assert_eq!(store.path(), Path::new("/tmp/dm/127_0_0_1_8000.json"));

        let store = FileStore::for_origin("/tmp/dm", "https://dates.example.com/api").unwrap();
        assert_eq!(store.path(), Path::new("/tmp/dm/dates_example_com_443.json"));

        assert!(FileStore::for_origin("/tmp/dm", "not a url").is_err());
    }
}
