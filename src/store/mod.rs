//! Conversation record storage.
//!
//! Records are keyed by conversation fingerprint and expire after a TTL.
//! Reads and writes are independent: concurrent requests sharing a
//! fingerprint race and the last writer wins.
//! - [`memory`]: in-process map with `Instant` expiry
//! - [`file`]: one JSON file per key under a base directory

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::record::ConversationCacheRecord;
use crate::config::{StoreBackend, StoreConfig};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store for conversation records.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live record, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<ConversationCacheRecord>, StoreError>;

    /// Store a record for `ttl_seconds`. A TTL of zero removes the key.
    async fn set(
        &self,
        key: &str,
        record: &ConversationCacheRecord,
        ttl_seconds: u64,
    ) -> Result<(), StoreError>;
}

/// Thread-safe handle to a store.
pub type SharedStore = Arc<dyn CacheStore>;

/// Open the backend named in the configuration.
pub async fn open_store(config: &StoreConfig) -> Result<SharedStore, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => Ok(Arc::new(FileStore::new(config.path.clone()).await?)),
    }
}
