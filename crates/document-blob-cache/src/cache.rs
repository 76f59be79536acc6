//! File-based blob storage with an in-memory index

use crate::error::{BlobCacheError, Result};
use crate::types::{BlobEntry, CacheStats};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const BLOB_DIR: &str = "blobs";

#[derive(Default)]
struct Index {
    entries: HashMap<String, BlobEntry>,
    /// Secondary ordering over `cached_at`, oldest first
    by_age: BTreeSet<(DateTime<Utc>, String)>,
    total_size: u64,
}

impl Index {
    fn from_entries(entries: Vec<BlobEntry>) -> Self {
        let mut index = Index::default();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    fn insert(&mut self, entry: BlobEntry) {
        self.remove(&entry.key);
        self.by_age.insert((entry.cached_at, entry.key.clone()));
        self.total_size += entry.size;
        self.entries.insert(entry.key.clone(), entry);
    }

    fn remove(&mut self, key: &str) -> Option<BlobEntry> {
        let entry = self.entries.remove(key)?;
        self.by_age.remove(&(entry.cached_at, entry.key.clone()));
        self.total_size = self.total_size.saturating_sub(entry.size);
        Some(entry)
    }

    /// Entries cached strictly before `cutoff`, oldest first
    fn older_than(&self, cutoff: DateTime<Utc>) -> Vec<BlobEntry> {
        self.by_age
            .range(..(cutoff, String::new()))
            .filter_map(|(_, key)| self.entries.get(key).cloned())
            .collect()
    }

    fn snapshot(&self) -> Vec<BlobEntry> {
        self.by_age
            .iter()
            .filter_map(|(_, key)| self.entries.get(key).cloned())
            .collect()
    }
}

/// A blob cache with in-memory metadata and file-based storage
pub struct BlobCache {
    index: RwLock<Index>,
    /// Root directory holding `index.json` and the `blobs/` directory
    root: PathBuf,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
    /// Suffix source for temporary blob files
    temp_counter: AtomicU64,
}

impl BlobCache {
    /// Open (or create) a blob cache rooted at `root`.
    ///
    /// Fails with [`BlobCacheError::Unavailable`] when the directory cannot be
    /// created or the index cannot be written. A corrupt index is discarded
    /// together with the blobs it described.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let blob_dir = root.join(BLOB_DIR);
        fs::create_dir_all(&blob_dir)
            .await
            .map_err(|e| BlobCacheError::Unavailable(Box::new(e)))?;

        let entries = match fs::read(root.join(INDEX_FILE)).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<BlobEntry>>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(root = ?root, error = %e, "Blob index is corrupt, resetting cache");
                    if let Err(e) = fs::remove_dir_all(&blob_dir).await {
                        warn!(error = %e, "Failed to clear blob directory");
                    }
                    fs::create_dir_all(&blob_dir)
                        .await
                        .map_err(|e| BlobCacheError::Unavailable(Box::new(e)))?;
                    Vec::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(BlobCacheError::Unavailable(Box::new(e))),
        };

        let cache = Self {
            index: RwLock::new(Index::from_entries(entries)),
            root,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            temp_counter: AtomicU64::new(0),
        };

        {
            let index = cache.index.read().await;
            cache.write_index(&index).await.map_err(|e| match e {
                BlobCacheError::Io(io) => BlobCacheError::Unavailable(io),
                other => other,
            })?;
            info!(root = ?cache.root, entries = index.entries.len(), "Blob cache opened");
        }

        Ok(cache)
    }

    /// File name used for a key's blob
    pub fn cache_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, file_name: &str) -> PathBuf {
        self.root.join(BLOB_DIR).join(file_name)
    }

    /// Store a blob stamped with the current time
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<BlobEntry> {
        self.put_at(key, data, Utc::now()).await
    }

    /// Store a blob with an explicit `cached_at` stamp, replacing any previous blob
    pub async fn put_at(
        &self,
        key: &str,
        data: &[u8],
        cached_at: DateTime<Utc>,
    ) -> Result<BlobEntry> {
        let file_name = Self::cache_key(key);
        let temp_path = self.blob_path(&format!(
            "{}.{}.tmp",
            file_name,
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let entry = BlobEntry {
            key: key.to_string(),
            file_name,
            size: data.len() as u64,
            cached_at,
        };

        let mut index = self.index.write().await;
        if let Err(e) = fs::rename(&temp_path, self.blob_path(&entry.file_name)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        index.insert(entry.clone());
        self.persist(&index).await;
        debug!(key = %key, size = entry.size, "Cached blob");

        Ok(entry)
    }

    /// Read a blob. A blob whose file vanished is reported as absent and
    /// dropped from the index.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = {
            let index = self.index.read().await;
            index.entries.get(key).cloned()
        };

        let Some(entry) = entry else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        match fs::read(self.blob_path(&entry.file_name)).await {
            Ok(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache hit");
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(key = %key, "Cached blob file is missing, dropping index entry");
                self.forget(&entry).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop an index entry unless it has been replaced since it was read
    async fn forget(&self, stale: &BlobEntry) {
        let mut index = self.index.write().await;
        let unchanged = index
            .entries
            .get(&stale.key)
            .is_some_and(|current| current.cached_at == stale.cached_at);
        if unchanged {
            index.remove(&stale.key);
            self.persist(&index).await;
        }
    }

    pub async fn entry(&self, key: &str) -> Option<BlobEntry> {
        self.index.read().await.entries.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.index.read().await.entries.contains_key(key)
    }

    /// Remove a blob. Returns whether an entry existed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut index = self.index.write().await;
        let Some(entry) = index.remove(key) else {
            return false;
        };
        self.remove_blob_file(&entry).await;
        self.persist(&index).await;
        debug!(key = %key, "Deleted blob");
        true
    }

    /// Entries cached strictly before `cutoff`, oldest first
    pub async fn entries_older_than(&self, cutoff: DateTime<Utc>) -> Vec<BlobEntry> {
        self.index.read().await.older_than(cutoff)
    }

    /// Remove every blob cached strictly before `cutoff`. Returns the number removed.
    pub async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut index = self.index.write().await;
        let expired = index.older_than(cutoff);

        for entry in &expired {
            index.remove(&entry.key);
            self.remove_blob_file(entry).await;
            debug!(key = %entry.key, cached_at = %entry.cached_at, "Swept expired blob");
        }

        if !expired.is_empty() {
            self.persist(&index).await;
        }
        info!(removed = expired.len(), cutoff = %cutoff, "Blob sweep finished");

        expired.len()
    }

    async fn remove_blob_file(&self, entry: &BlobEntry) {
        match fs::remove_file(self.blob_path(&entry.file_name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(key = %entry.key, error = %e, "Failed to remove blob file"),
        }
    }

    /// Write the index, logging instead of failing. The in-memory index stays
    /// authoritative until the next successful write.
    async fn persist(&self, index: &Index) {
        if let Err(e) = self.write_index(index).await {
            warn!(root = ?self.root, error = %e, "Failed to persist blob index");
        }
    }

    async fn write_index(&self, index: &Index) -> Result<()> {
        let json = serde_json::to_vec(&index.snapshot())?;
        let temp_path = self.root.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, self.root.join(INDEX_FILE)).await?;
        Ok(())
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.read().await;
        CacheStats {
            entries: index.entries.len(),
            total_size: index.total_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
