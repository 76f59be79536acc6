//! Persisted metadata registry
//!
//! The registry is stored as a single JSON snapshot `{ "files": [...] }` under
//! a fixed key of a synchronous key-value surface. Every save overwrites the
//! whole snapshot.

use crate::error::{RecentFilesError, Result};
use crate::types::DocumentRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Key the snapshot is stored under
pub const SNAPSHOT_KEY: &str = "recent_files";

/// A small synchronous string-keyed store
pub trait KeyValueSurface: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory
pub struct FileSurface {
    dir: PathBuf,
}

impl FileSurface {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueSurface for FileSurface {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

/// In-process surface, mainly for tests and ephemeral sessions
#[derive(Default)]
pub struct MemorySurface {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface pre-loaded with a raw value
    pub fn with_value(key: &str, value: &str) -> Self {
        let surface = Self::default();
        surface.lock().insert(key.to_string(), value.to_string());
        surface
    }

    /// Make subsequent `set` calls fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueSurface for MemorySurface {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("memory surface is read-only").into());
        }
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: KeyValueSurface + ?Sized> KeyValueSurface for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Durable home of the document registry
pub trait MetadataStore: Send + Sync {
    /// Load every record, most recent first. Unreadable snapshots load as empty.
    fn load_all(&self) -> Result<Vec<DocumentRecord>>;
    /// Replace the stored snapshot with `records`
    fn save_all(&self, records: &[DocumentRecord]) -> Result<()>;
}

/// Records are parsed one at a time so a single bad entry cannot take the
/// rest of the registry with it.
#[derive(Deserialize)]
struct Snapshot {
    files: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    files: &'a [DocumentRecord],
}

/// [`MetadataStore`] that keeps one JSON snapshot in a [`KeyValueSurface`]
pub struct SnapshotMetadataStore<S> {
    surface: S,
    key: String,
}

impl<S: KeyValueSurface> SnapshotMetadataStore<S> {
    pub fn new(surface: S) -> Self {
        Self::with_key(surface, SNAPSHOT_KEY)
    }

    pub fn with_key(surface: S, key: &str) -> Self {
        Self {
            surface,
            key: key.to_string(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

impl<S: KeyValueSurface> MetadataStore for SnapshotMetadataStore<S> {
    fn load_all(&self) -> Result<Vec<DocumentRecord>> {
        let Some(raw) = self.surface.get(&self.key)? else {
            debug!(key = %self.key, "No metadata snapshot yet");
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => {
                let total = snapshot.files.len();
                let records: Vec<DocumentRecord> = snapshot
                    .files
                    .into_iter()
                    .filter_map(|value| match serde_json::from_value(value) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!(key = %self.key, error = %e, "Skipping unreadable record");
                            None
                        }
                    })
                    .collect();
                if records.len() < total {
                    warn!(
                        key = %self.key,
                        skipped = total - records.len(),
                        "Dropped unreadable records from metadata snapshot"
                    );
                }
                Ok(records)
            }
            Err(e) => {
                let err = RecentFilesError::StorageCorrupt(e.to_string());
                warn!(key = %self.key, error = %err, "Resetting unreadable metadata snapshot");
                if let Err(e) = self.save_all(&[]) {
                    warn!(key = %self.key, error = %e, "Failed to reset metadata snapshot");
                }
                Ok(Vec::new())
            }
        }
    }

    fn save_all(&self, records: &[DocumentRecord]) -> Result<()> {
        let json = serde_json::to_string(&SnapshotRef { files: records })?;
        self.surface.set(&self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(fingerprint: &str, opened_at: i64) -> DocumentRecord {
        DocumentRecord::new(fingerprint, "doc.pdf", "https://example.com/doc.pdf", opened_at)
    }

    #[test]
    fn test_empty_surface_loads_nothing() {
        let store = SnapshotMetadataStore::new(MemorySurface::new());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_order() {
        let store = SnapshotMetadataStore::new(MemorySurface::new());
        store.save_all(&[record("b", 2), record("a", 1)]).unwrap();

        let loaded = store.load_all().unwrap();
        let fingerprints: Vec<&str> = loaded.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(fingerprints, vec!["b", "a"]);
    }

    #[test]
    fn test_snapshot_format() {
        let store = SnapshotMetadataStore::new(MemorySurface::new());
        store.save_all(&[record("a", 1)]).unwrap();

        let raw = store.surface().raw(SNAPSHOT_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["files"][0]["fingerprint"], "a");
        assert_eq!(value["files"][0]["sourceLocator"], "https://example.com/doc.pdf");
    }

    #[test]
    fn test_corrupt_snapshot_resets_to_empty() {
        let surface = MemorySurface::with_value(SNAPSHOT_KEY, "{\"files\": [oops");
        let store = SnapshotMetadataStore::new(surface);

        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(
            store.surface().raw(SNAPSHOT_KEY).as_deref(),
            Some("{\"files\":[]}")
        );
    }

    #[test]
    fn test_wrong_shape_counts_as_corrupt() {
        let store = SnapshotMetadataStore::new(MemorySurface::with_value(SNAPSHOT_KEY, "[1, 2]"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_record_does_not_reset_the_rest() {
        let raw = r#"{ "files": [
            { "fingerprint": "good", "displayName": "a.pdf",
              "sourceLocator": "/a.pdf", "lastOpenedAt": 2 },
            { "displayName": "missing fingerprint", "lastOpenedAt": 1 },
            { "fingerprint": "tilted", "displayName": "b.pdf", "sourceLocator": "/b.pdf",
              "lastOpenedAt": 1, "viewState": { "rotationDegrees": 45 } }
        ] }"#;
        let store = SnapshotMetadataStore::new(MemorySurface::with_value(SNAPSHOT_KEY, raw));

        let loaded = store.load_all().unwrap();
        let fingerprints: Vec<&str> = loaded.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(fingerprints, vec!["good", "tilted"]);
        assert_eq!(store.surface().raw(SNAPSHOT_KEY).as_deref(), Some(raw));
    }

    #[test]
    fn test_failed_write_is_reported() {
        let surface = MemorySurface::new();
        surface.set_fail_writes(true);
        let store = SnapshotMetadataStore::new(surface);

        assert!(store.save_all(&[record("a", 1)]).is_err());
    }

    #[test]
    fn test_file_surface_round_trip() {
        let dir = tempdir().unwrap();
        let store = SnapshotMetadataStore::new(FileSurface::new(dir.path().join("meta")));

        store.save_all(&[record("a", 1)]).unwrap();
        assert!(dir.path().join("meta").join("recent_files.json").exists());

        let reopened = SnapshotMetadataStore::new(FileSurface::new(dir.path().join("meta")));
        assert_eq!(reopened.load_all().unwrap()[0].fingerprint, "a");
    }
}
