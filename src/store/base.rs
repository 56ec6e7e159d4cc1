use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::{StoreBackend, StoreConfig};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store file is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

/// The TokenStore trait abstracts the client-side key/value store the bearer
/// token is persisted in. Absence of the entry means "not authenticated".
#[async_trait]
pub trait TokenStore: Send + Sync {
    fn name(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Creates a concrete store implementation based on the StoreConfig.
pub fn create_store(config: &StoreConfig) -> Arc<dyn TokenStore> {
    match &config.backend {
        StoreBackend::Memory => {
            info!("Token store is in-memory; the token will not survive a restart.");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::File(file) => {
            info!("Persisting token to '{}'", file.path);
            Arc::new(FileStore::new(&file.path))
        }
    }
}
