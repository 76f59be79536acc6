//! Asynchronous document content storage

use crate::error::{RecentFilesError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use document_blob_cache::BlobCache;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Keyed blob storage for document bytes.
///
/// Timestamps are epoch milliseconds.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `content`, replacing any previous blob. Returns the stored size.
    async fn put(&self, fingerprint: &str, content: &[u8], cached_at: i64) -> Result<u64>;
    async fn get(&self, fingerprint: &str) -> Result<Option<Vec<u8>>>;
    /// Remove a blob; removing an absent blob succeeds
    async fn delete(&self, fingerprint: &str) -> Result<()>;
    /// Remove blobs cached before `cutoff`. Returns the number removed.
    async fn sweep_older_than(&self, cutoff: i64) -> Result<usize>;
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

#[async_trait]
impl ContentStore for BlobCache {
    async fn put(&self, fingerprint: &str, content: &[u8], cached_at: i64) -> Result<u64> {
        let cached_at = millis_to_datetime(cached_at).ok_or_else(|| {
            RecentFilesError::CacheWriteFailed(format!("timestamp {} out of range", cached_at))
        })?;
        let entry = self.put_at(fingerprint, content, cached_at).await?;
        Ok(entry.size)
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<Vec<u8>>> {
        Ok(BlobCache::get(self, fingerprint).await?)
    }

    async fn delete(&self, fingerprint: &str) -> Result<()> {
        BlobCache::delete(self, fingerprint).await;
        Ok(())
    }

    async fn sweep_older_than(&self, cutoff: i64) -> Result<usize> {
        match millis_to_datetime(cutoff) {
            Some(cutoff) => Ok(BlobCache::sweep_older_than(self, cutoff).await),
            None => Ok(0),
        }
    }
}

/// Content storage as seen by the cache: either a working store or nothing
#[derive(Clone)]
pub enum ContentBackend {
    Available(Arc<dyn ContentStore>),
    /// Every content operation is a no-op for the life of the process
    Unavailable,
}

impl ContentBackend {
    pub fn available(store: impl ContentStore + 'static) -> Self {
        ContentBackend::Available(Arc::new(store))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ContentBackend::Available(_))
    }

    pub(crate) fn store(&self) -> Option<&Arc<dyn ContentStore>> {
        match self {
            ContentBackend::Available(store) => Some(store),
            ContentBackend::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for ContentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentBackend::Available(_) => write!(f, "ContentBackend::Available"),
            ContentBackend::Unavailable => write!(f, "ContentBackend::Unavailable"),
        }
    }
}

/// Open the on-disk blob cache, degrading to [`ContentBackend::Unavailable`]
/// when it cannot be opened.
pub async fn open_content_store(dir: impl Into<PathBuf>) -> ContentBackend {
    let dir = dir.into();
    match BlobCache::open(&dir).await {
        Ok(cache) => {
            info!(dir = ?dir, "Content cache ready");
            ContentBackend::available(cache)
        }
        Err(e) => {
            let err = RecentFilesError::from(e);
            warn!(dir = ?dir, error = %err, "Content caching disabled");
            ContentBackend::Unavailable
        }
    }
}

/// In-memory content store with failure injection
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, i64)>>,
    fail_puts: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent puts fail
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Drop a blob behind the cache's back
    pub fn remove_out_of_band(&self, fingerprint: &str) -> bool {
        self.lock().remove(fingerprint).is_some()
    }

    /// Insert a blob directly, bypassing the cache
    pub fn insert_out_of_band(&self, fingerprint: &str, content: &[u8], cached_at: i64) {
        self.lock()
            .insert(fingerprint.to_string(), (content.to_vec(), cached_at));
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.lock().contains_key(fingerprint)
    }

    pub fn cached_at(&self, fingerprint: &str) -> Option<i64> {
        self.lock().get(fingerprint).map(|(_, at)| *at)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, i64)>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, fingerprint: &str, content: &[u8], cached_at: i64) -> Result<u64> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(RecentFilesError::CacheWriteFailed(
                "memory store rejected the write".to_string(),
            ));
        }
        self.insert_out_of_band(fingerprint, content, cached_at);
        Ok(content.len() as u64)
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(fingerprint).map(|(data, _)| data.clone()))
    }

    async fn delete(&self, fingerprint: &str) -> Result<()> {
        self.lock().remove(fingerprint);
        Ok(())
    }

    async fn sweep_older_than(&self, cutoff: i64) -> Result<usize> {
        let mut blobs = self.lock();
        let before = blobs.len();
        blobs.retain(|_, (_, cached_at)| *cached_at >= cutoff);
        Ok(before - blobs.len())
    }
}

#[async_trait]
impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    async fn put(&self, fingerprint: &str, content: &[u8], cached_at: i64) -> Result<u64> {
        (**self).put(fingerprint, content, cached_at).await
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(fingerprint).await
    }

    async fn delete(&self, fingerprint: &str) -> Result<()> {
        (**self).delete(fingerprint).await
    }

    async fn sweep_older_than(&self, cutoff: i64) -> Result<usize> {
        (**self).sweep_older_than(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    #[tokio::test]
    async fn test_blob_cache_as_content_store() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn ContentStore> = Arc::new(BlobCache::open(dir.path()).await.unwrap());
        let now = Utc::now().timestamp_millis();

        assert_eq!(store.put("fp", b"bytes", now).await.unwrap(), 5);
        assert_eq!(store.get("fp").await.unwrap().unwrap(), b"bytes");

        store.delete("fp").await.unwrap();
        store.delete("fp").await.unwrap();
        assert!(store.get("fp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blob_cache_sweep_uses_millis() {
        let dir = tempdir().unwrap();
        let store = BlobCache::open(dir.path()).await.unwrap();
        let now = Utc::now().timestamp_millis();

        ContentStore::put(&store, "old", b"o", now - 31 * DAY_MS).await.unwrap();
        ContentStore::put(&store, "new", b"n", now).await.unwrap();

        let removed = ContentStore::sweep_older_than(&store, now - 30 * DAY_MS)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.contains("new").await);
    }

    #[tokio::test]
    async fn test_open_content_store_degrades_when_unavailable() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"file, not a directory").unwrap();

        assert!(!open_content_store(&blocked).await.is_available());
        assert!(open_content_store(dir.path().join("ok")).await.is_available());
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryContentStore::new();
        store.set_fail_puts(true);
        assert!(matches!(
            store.put("fp", b"x", 0).await,
            Err(RecentFilesError::CacheWriteFailed(_))
        ));
        assert!(store.is_empty());
    }
}
