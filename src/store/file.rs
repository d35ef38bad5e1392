//! File-backed record store.
//!
//! Each key maps to one JSON file holding the record and its absolute
//! expiry time. Uses tokio's async file I/O.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::cache::record::ConversationCacheRecord;
use crate::cache::segment::content_hash;
use crate::store::{CacheStore, StoreError};

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    /// Seconds since the Unix epoch after which the record is dead.
    expires_at: u64,
    record: ConversationCacheRecord,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Records persisted as JSON files under a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create the store, making sure the base directory exists.
    pub async fn new(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    /// Keys are hashed to safe file names, sharded by the first two hex
    /// digits to avoid too many files in one directory.
    fn record_path(&self, key: &str) -> PathBuf {
        let name = content_hash(key);
        self.base_path
            .join(&name[..2])
            .join(format!("{name}.json"))
    }

    async fn remove(&self, path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<ConversationCacheRecord>, StoreError> {
        let path = self.record_path(key);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredRecord = serde_json::from_slice(&data)?;
        if stored.expires_at <= unix_now() {
            debug!(path = %path.display(), "Record expired");
            self.remove(&path).await?;
            return Ok(None);
        }

        debug!(path = %path.display(), size = data.len(), "Read record");
        Ok(Some(stored.record))
    }

    async fn set(
        &self,
        key: &str,
        record: &ConversationCacheRecord,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let path = self.record_path(key);
        if ttl_seconds == 0 {
            return self.remove(&path).await;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let stored = StoredRecord {
            expires_at: unix_now().saturating_add(ttl_seconds),
            record: record.clone(),
        };
        let data = serde_json::to_vec(&stored)?;

        // Write-then-rename so readers never see a torn file. Each writer
        // gets its own temp file; the last rename wins.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), size = data.len(), ttl_seconds, "Wrote record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> ConversationCacheRecord {
        ConversationCacheRecord {
            fingerprint: "fp".to_string(),
            segments: Vec::new(),
            breakpoints: [1, 6].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read_record() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("records")).await.unwrap();

        store.set("prompt_cache:abc", &record(), 60).await.unwrap();
        let loaded = store.get("prompt_cache:abc").await.unwrap().unwrap();
        assert_eq!(loaded, record());

        assert!(store.get("prompt_cache:other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_deletes_record() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();

        store.set("k", &record(), 60).await.unwrap();
        store.set("k", &record(), 0).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_is_miss() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();

        let path = store.record_path("k");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        let stale = StoredRecord {
            expires_at: 1,
            record: record(),
        };
        fs::write(&path, serde_json::to_vec(&stale).unwrap()).await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_key() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut rec = record();
                    rec.fingerprint = format!("writer-{i}");
                    store.set("k", &rec, 60).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = store.get("k").await.unwrap().unwrap();
        assert!(loaded.fingerprint.starts_with("writer-"));

        // No temp files left behind next to the record.
        let shard = store.record_path("k").parent().unwrap().to_path_buf();
        let mut entries = fs::read_dir(&shard).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names.len(), 1, "{names:?}");

        // A later write replaces whatever won the race.
        let mut last = record();
        last.fingerprint = "last".to_string();
        store.set("k", &last, 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), last);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();

        let path = store.record_path("k");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(store.get("k").await, Err(StoreError::Serialization(_))));
    }
}
