use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StoreError, TokenStore};

/// Persists entries as a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written document.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileStore {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} entries to '{}'", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("authrelay-test-{}", uuid::Uuid::new_v4()))
            .join("token.json")
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let store = FileStore::new(scratch_path());
        assert_eq!(store.get("accessToken").await.unwrap(), None);
        assert!(store.remove("accessToken").await.is_ok());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let path = scratch_path();
        FileStore::new(&path).set("accessToken", "t1").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("accessToken").await.unwrap().as_deref(), Some("t1"));

        reopened.remove("accessToken").await.unwrap();
        assert_eq!(FileStore::new(&path).get("accessToken").await.unwrap(), None);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_file_store_keeps_other_keys() {
        let path = scratch_path();
        let store = FileStore::new(&path);
        store.set("accessToken", "t1").await.unwrap();
        store.set("theme", "dark").await.unwrap();
        store.remove("accessToken").await.unwrap();

        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_file() {
        let path = scratch_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = FileStore::new(&path).get("accessToken").await;
        assert!(matches!(result, Err(StoreError::Format(_))));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
