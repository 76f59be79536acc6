//! Recent files cache
//!
//! Owns the in-memory registry behind a single lock. Every mutation is applied
//! to the registry, checked against the capacity bound, persisted as a full
//! snapshot and announced before the lock is released. Content-store work is
//! spawned afterwards and reported back through [`PendingContent`].
//!
//! Content operations on one fingerprint are queued: each takes a turn while
//! the registry lock is held and waits for the previous turn to finish, so
//! they complete in the order the registry issued them.

use crate::clock::{Clock, SystemClock};
use crate::config::RecentFilesConfig;
use crate::content::{ContentBackend, ContentStore};
use crate::error::{RecentFilesError, Result};
use crate::events::{Notifier, RecentFilesEvent};
use crate::eviction::EvictionPolicy;
use crate::format::matches_query;
use crate::metadata::MetadataStore;
use crate::types::{
    display_name_or_default, CacheStatus, DocumentRecord, OpenedDocument, ViewStatePatch,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Slot {
    record: DocumentRecord,
    /// Breaks `last_opened_at` ties; higher was touched later
    seq: u64,
    /// Bumped whenever the cache flags change
    cache_generation: u64,
}

/// Last queued content operation for a fingerprint
struct QueueTail {
    ticket: u64,
    done: oneshot::Receiver<()>,
}

/// A place in one fingerprint's content queue
struct ContentTurn {
    fingerprint: String,
    ticket: u64,
    previous: Option<oneshot::Receiver<()>>,
    // Dropping this releases the next turn
    _done: oneshot::Sender<()>,
}

impl ContentTurn {
    async fn wait(&mut self) {
        if let Some(previous) = self.previous.take() {
            // An error only means the previous holder is gone, which is the signal.
            let _ = previous.await;
        }
    }
}

#[derive(Default)]
struct Registry {
    slots: HashMap<String, Slot>,
    next_seq: u64,
    content_queue: HashMap<String, QueueTail>,
    next_ticket: u64,
}

impl Registry {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Records, most recently opened first
    fn ordered(&self) -> Vec<DocumentRecord> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_by(|a, b| {
            b.record
                .last_opened_at
                .cmp(&a.record.last_opened_at)
                .then(b.seq.cmp(&a.seq))
        });
        slots.into_iter().map(|slot| slot.record.clone()).collect()
    }

    fn take_turn(&mut self, fingerprint: &str) -> ContentTurn {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let (done, rx) = oneshot::channel();
        let previous = self
            .content_queue
            .insert(fingerprint.to_string(), QueueTail { ticket, done: rx })
            .map(|tail| tail.done);
        ContentTurn {
            fingerprint: fingerprint.to_string(),
            ticket,
            previous,
            _done: done,
        }
    }
}

/// Content-store work scheduled by a call and still running in the background.
///
/// Dropping this lets the work finish on its own; failures are logged either way.
#[derive(Debug, Default)]
pub struct PendingContent {
    tasks: Vec<JoinHandle<()>>,
}

impl PendingContent {
    fn track(&mut self, task: Option<JoinHandle<()>>) {
        self.tasks.extend(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every scheduled task to finish
    pub async fn settled(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Content task did not complete");
            }
        }
    }
}

struct Shared {
    registry: Mutex<Registry>,
    metadata: Box<dyn MetadataStore>,
    content: ContentBackend,
    policy: EvictionPolicy,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    startup: Mutex<PendingContent>,
}

impl Shared {
    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist the registry and optionally announce it. Save failures are
    /// logged; the in-memory registry stays authoritative.
    fn commit(&self, registry: &Registry, announce: bool) {
        let files = registry.ordered();
        if let Err(e) = self.metadata.save_all(&files) {
            warn!(error = %e, "Failed to persist recent files");
        }
        if announce {
            self.notifier
                .publish(RecentFilesEvent::RegistryChanged { files });
        }
    }

    /// Drop records beyond the capacity bound. Returns the dropped fingerprints.
    fn enforce_capacity(&self, registry: &mut Registry) -> Vec<String> {
        if registry.slots.len() <= self.policy.capacity() {
            return Vec::new();
        }

        let ordered = registry.ordered();
        let plan = self.policy.plan(&ordered);
        for fingerprint in &plan.drop {
            registry.slots.remove(fingerprint);
        }
        info!(
            evicted = plan.drop.len(),
            capacity = self.policy.capacity(),
            "Evicted least recently opened documents"
        );
        plan.drop
    }

    /// Queue a content operation. `None` when there is no content store.
    fn take_turn(&self, registry: &mut Registry, fingerprint: &str) -> Option<ContentTurn> {
        self.content
            .is_available()
            .then(|| registry.take_turn(fingerprint))
    }

    fn finish_turn(&self, turn: ContentTurn) {
        let mut registry = self.lock_registry();
        let is_tail = registry
            .content_queue
            .get(&turn.fingerprint)
            .is_some_and(|tail| tail.ticket == turn.ticket);
        if is_tail {
            registry.content_queue.remove(&turn.fingerprint);
        }
    }

    /// Record a successful content write. Returns false when the document is
    /// no longer tracked.
    fn apply_cached(&self, fingerprint: &str, byte_size: u64) -> bool {
        let mut registry = self.lock_registry();
        let Some(slot) = registry.slots.get_mut(fingerprint) else {
            return false;
        };
        slot.record.is_content_cached = true;
        slot.record.cached_byte_size = byte_size;
        slot.cache_generation += 1;
        self.commit(&registry, true);
        true
    }

    /// Clear a cache flag found to be stale, unless it changed since `generation`
    fn mark_uncached(&self, fingerprint: &str, generation: u64) {
        let mut registry = self.lock_registry();
        let Some(slot) = registry.slots.get_mut(fingerprint) else {
            return;
        };
        if slot.cache_generation != generation || !slot.record.is_content_cached {
            return;
        }
        slot.record.is_content_cached = false;
        slot.cache_generation += 1;
        info!(fingerprint = %fingerprint, "Cached content was missing, cleared cache flag");
        self.commit(&registry, true);
    }

    fn spawn_store(
        self: &Arc<Self>,
        mut turn: ContentTurn,
        content: Vec<u8>,
        cached_at: i64,
    ) -> Option<JoinHandle<()>> {
        let store = Arc::clone(self.content.store()?);
        let shared = Arc::clone(self);
        Some(self.runtime.spawn(async move {
            turn.wait().await;
            let fingerprint = turn.fingerprint.as_str();
            match store.put(fingerprint, &content, cached_at).await {
                Ok(byte_size) if shared.apply_cached(fingerprint, byte_size) => {
                    debug!(fingerprint = %fingerprint, byte_size, "Cached document content");
                }
                Ok(_) => {
                    debug!(
                        fingerprint = %fingerprint,
                        "Document left the registry while caching, discarding content"
                    );
                    if let Err(e) = store.delete(fingerprint).await {
                        warn!(
                            fingerprint = %fingerprint,
                            error = %e,
                            "Failed to discard orphaned content"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        fingerprint = %fingerprint,
                        error = %e,
                        "Failed to cache document content"
                    );
                }
            }
            shared.finish_turn(turn);
        }))
    }

    fn spawn_purge(self: &Arc<Self>, mut turn: ContentTurn) -> Option<JoinHandle<()>> {
        let store = Arc::clone(self.content.store()?);
        let shared = Arc::clone(self);
        Some(self.runtime.spawn(async move {
            turn.wait().await;
            let fingerprint = turn.fingerprint.as_str();
            match store.delete(fingerprint).await {
                Ok(()) => debug!(fingerprint = %fingerprint, "Purged cached content"),
                Err(e) => {
                    warn!(fingerprint = %fingerprint, error = %e, "Failed to purge cached content")
                }
            }
            shared.finish_turn(turn);
        }))
    }

    /// Purge content older than the retention horizon. Metadata is left alone.
    async fn sweep(&self) -> usize {
        let Some(store) = self.content.store() else {
            return 0;
        };
        let cutoff = self.policy.retention_cutoff(self.clock.now_millis());
        match store.sweep_older_than(cutoff).await {
            Ok(removed) => {
                info!(removed, cutoff, "Swept expired document content");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Failed to sweep expired document content");
                0
            }
        }
    }
}

/// Recency-ordered registry of opened documents with a best-effort content cache.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct RecentFilesCache {
    shared: Arc<Shared>,
}

impl RecentFilesCache {
    /// Load the registry and start background maintenance on the current
    /// Tokio runtime.
    pub async fn open(
        config: RecentFilesConfig,
        metadata: impl MetadataStore + 'static,
        content: ContentBackend,
    ) -> Self {
        Self::open_with_clock(config, metadata, content, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        config: RecentFilesConfig,
        metadata: impl MetadataStore + 'static,
        content: ContentBackend,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let records = match metadata.load_all() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to load recent files, starting empty");
                Vec::new()
            }
        };

        // Snapshots list the most recent first; the first occurrence of a
        // fingerprint wins and keeps its place among ties.
        let mut registry = Registry::default();
        for record in records.into_iter().rev() {
            let seq = registry.next_seq();
            registry.slots.insert(
                record.fingerprint.clone(),
                Slot {
                    record,
                    seq,
                    cache_generation: 0,
                },
            );
        }

        let shared = Arc::new(Shared {
            registry: Mutex::new(registry),
            metadata: Box::new(metadata),
            content,
            policy: EvictionPolicy::from_config(&config),
            notifier: Notifier::new(),
            clock,
            runtime: Handle::current(),
            startup: Mutex::new(PendingContent::default()),
        });

        let (documents, purges) = {
            let mut registry = shared.lock_registry();
            let evicted = shared.enforce_capacity(&mut registry);
            if !evicted.is_empty() {
                shared.commit(&registry, false);
            }
            let purges: Vec<ContentTurn> = evicted
                .iter()
                .filter_map(|fp| shared.take_turn(&mut registry, fp))
                .collect();
            (registry.slots.len(), purges)
        };

        let mut startup = PendingContent::default();
        for turn in purges {
            startup.track(shared.spawn_purge(turn));
        }
        if shared.content.is_available() {
            let sweeper = Arc::clone(&shared);
            startup.track(Some(shared.runtime.spawn(async move {
                sweeper.sweep().await;
            })));
        }

        info!(
            documents,
            capacity = shared.policy.capacity(),
            content_cache = shared.content.is_available(),
            "Recent files cache ready"
        );

        *shared.startup.lock().unwrap_or_else(PoisonError::into_inner) = startup;
        let cache = Self { shared };
        if let Some(interval) = config.sweep_interval {
            cache.spawn_periodic_sweep(interval);
        }
        cache
    }

    /// Take the handles of the startup work (capacity purges and the first sweep)
    pub fn startup_work(&self) -> PendingContent {
        std::mem::take(&mut *self.shared.startup.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Track an opened document, refreshing it if already known.
    ///
    /// Supplied content is written to the content store in the background; a
    /// failed write leaves the previous cache flags untouched.
    pub fn record_opened(&self, opened: OpenedDocument) -> PendingContent {
        let shared = &self.shared;
        let now = shared.clock.now_millis();
        let OpenedDocument {
            fingerprint,
            display_name,
            source_locator,
            view_state,
            content,
        } = opened;

        let (purges, store) = {
            let mut registry = shared.lock_registry();
            let seq = registry.next_seq();
            match registry.slots.get_mut(&fingerprint) {
                Some(slot) => {
                    let record = &mut slot.record;
                    record.display_name = display_name_or_default(&display_name);
                    record.source_locator = source_locator;
                    record.last_opened_at = now;
                    record.view_state.apply(&view_state);
                    slot.seq = seq;
                }
                None => {
                    let mut record = DocumentRecord::new(
                        fingerprint.clone(),
                        &display_name,
                        source_locator,
                        now,
                    );
                    record.view_state.apply(&view_state);
                    registry.slots.insert(
                        fingerprint.clone(),
                        Slot {
                            record,
                            seq,
                            cache_generation: 0,
                        },
                    );
                }
            }
            let evicted = shared.enforce_capacity(&mut registry);
            shared.commit(&registry, true);

            let purges: Vec<ContentTurn> = evicted
                .iter()
                .filter_map(|fp| shared.take_turn(&mut registry, fp))
                .collect();
            let store = match content {
                Some(content) => shared
                    .take_turn(&mut registry, &fingerprint)
                    .map(|turn| (turn, content)),
                None => None,
            };
            (purges, store)
        };
        debug!(fingerprint = %fingerprint, "Recorded document open");

        let mut pending = PendingContent::default();
        for turn in purges {
            pending.track(shared.spawn_purge(turn));
        }
        if let Some((turn, content)) = store {
            pending.track(shared.spawn_store(turn, content, now));
        }
        pending
    }

    /// Read cached content, verifying the metadata hint against the store.
    ///
    /// A hint that turns out to be stale is cleared and persisted.
    pub async fn fetch_cached_content(&self, fingerprint: &str) -> Option<Vec<u8>> {
        let generation = {
            let registry = self.shared.lock_registry();
            let slot = registry.slots.get(fingerprint)?;
            match slot.record.cache_status() {
                CacheStatus::NotCached => return None,
                CacheStatus::Claimed { .. } => slot.cache_generation,
            }
        };

        let store = Arc::clone(self.shared.content.store()?);
        match store.get(fingerprint).await {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                self.shared.mark_uncached(fingerprint, generation);
                None
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Failed to read cached content");
                None
            }
        }
    }

    /// Whether the metadata believes content is cached. Not verified.
    pub fn is_cached(&self, fingerprint: &str) -> bool {
        self.shared
            .lock_registry()
            .slots
            .get(fingerprint)
            .is_some_and(|slot| slot.record.is_content_cached)
    }

    /// Merge a view state patch. Returns false for unknown documents.
    pub fn update_view_state(&self, fingerprint: &str, patch: &ViewStatePatch) -> bool {
        let now = self.shared.clock.now_millis();
        let mut registry = self.shared.lock_registry();
        let seq = registry.next_seq();
        let Some(slot) = registry.slots.get_mut(fingerprint) else {
            return false;
        };
        slot.record.view_state.apply(patch);
        slot.record.last_opened_at = now;
        slot.seq = seq;
        // The document count is unchanged, so the capacity bound still holds.
        self.shared.commit(&registry, false);
        true
    }

    /// Store an encoded preview image. Returns false for unknown documents.
    pub fn update_thumbnail(&self, fingerprint: &str, thumbnail: impl Into<String>) -> bool {
        let thumbnail = thumbnail.into();
        let mut registry = self.shared.lock_registry();
        let Some(slot) = registry.slots.get_mut(fingerprint) else {
            return false;
        };
        slot.record.thumbnail = Some(thumbnail.clone());
        self.shared.commit(&registry, false);
        self.shared
            .notifier
            .publish(RecentFilesEvent::ThumbnailUpdated {
                fingerprint: fingerprint.to_string(),
                thumbnail,
            });
        true
    }

    pub fn set_has_unsaved_edits(&self, fingerprint: &str, has_edits: bool) -> bool {
        let mut registry = self.shared.lock_registry();
        let Some(slot) = registry.slots.get_mut(fingerprint) else {
            return false;
        };
        slot.record.has_unsaved_edits = has_edits;
        self.shared.commit(&registry, false);
        true
    }

    /// Overwrite a tracked document's cached content and wait for the write.
    pub async fn replace_cached_content(&self, fingerprint: &str, content: Vec<u8>) -> Result<()> {
        let (store, mut turn) = {
            let mut registry = self.shared.lock_registry();
            if !registry.slots.contains_key(fingerprint) {
                return Err(RecentFilesError::UnknownDocument(fingerprint.to_string()));
            }
            let store = Arc::clone(self.shared.content.store().ok_or_else(|| {
                RecentFilesError::CacheWriteFailed("content storage is unavailable".to_string())
            })?);
            (store, registry.take_turn(fingerprint))
        };

        turn.wait().await;
        let result = self.write_replacement(store.as_ref(), fingerprint, &content).await;
        self.shared.finish_turn(turn);
        result
    }

    async fn write_replacement(
        &self,
        store: &dyn ContentStore,
        fingerprint: &str,
        content: &[u8],
    ) -> Result<()> {
        let cached_at = self.shared.clock.now_millis();
        let byte_size = store
            .put(fingerprint, content, cached_at)
            .await
            .map_err(|e| match e {
                RecentFilesError::CacheWriteFailed(_) => e,
                other => RecentFilesError::CacheWriteFailed(other.to_string()),
            })?;

        if !self.shared.apply_cached(fingerprint, byte_size) {
            if let Err(e) = store.delete(fingerprint).await {
                warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Failed to discard orphaned content"
                );
            }
            return Err(RecentFilesError::UnknownDocument(fingerprint.to_string()));
        }
        info!(fingerprint = %fingerprint, byte_size, "Replaced cached content");
        Ok(())
    }

    /// Stop tracking a document and purge its cached content
    pub fn remove(&self, fingerprint: &str) -> PendingContent {
        let (removed, purge) = {
            let mut registry = self.shared.lock_registry();
            let removed = registry.slots.remove(fingerprint).is_some();
            if removed {
                self.shared.commit(&registry, true);
            }
            (removed, self.shared.take_turn(&mut registry, fingerprint))
        };
        if removed {
            debug!(fingerprint = %fingerprint, "Removed document");
        }

        let mut pending = PendingContent::default();
        if let Some(turn) = purge {
            pending.track(self.shared.spawn_purge(turn));
        }
        pending
    }

    /// Forget every document and purge all their cached content
    pub fn clear_all(&self) -> PendingContent {
        let purges: Vec<ContentTurn> = {
            let mut registry = self.shared.lock_registry();
            if registry.slots.is_empty() {
                return PendingContent::default();
            }
            let fingerprints: Vec<String> = registry.slots.drain().map(|(fp, _)| fp).collect();
            self.shared.commit(&registry, true);
            info!(documents = fingerprints.len(), "Cleared recent files");
            fingerprints
                .iter()
                .filter_map(|fp| self.shared.take_turn(&mut registry, fp))
                .collect()
        };

        let mut pending = PendingContent::default();
        for turn in purges {
            pending.track(self.shared.spawn_purge(turn));
        }
        pending
    }
    /// All tracked documents, most recently opened first
    pub fn list_recent(&self) -> Vec<DocumentRecord> {
        self.shared.lock_registry().ordered()
    }

    pub fn get(&self, fingerprint: &str) -> Option<DocumentRecord> {
        self.shared
            .lock_registry()
            .slots
            .get(fingerprint)
            .map(|slot| slot.record.clone())
    }

    /// Documents whose name or source contains `query`, ignoring case
    pub fn search(&self, query: &str) -> Vec<DocumentRecord> {
        self.list_recent()
            .into_iter()
            .filter(|record| matches_query(record, query))
            .collect()
    }

    /// Ask front ends to open a tracked document
    pub fn request_open(&self, fingerprint: &str) -> Option<DocumentRecord> {
        let record = self.get(fingerprint)?;
        self.shared.notifier.publish(RecentFilesEvent::OpenRequested {
            record: record.clone(),
        });
        Some(record)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RecentFilesEvent> {
        self.shared.notifier.subscribe()
    }

    /// Purge cached content older than the retention horizon
    pub async fn sweep_expired(&self) -> usize {
        self.shared.sweep().await
    }

    /// Re-run the retention sweep every `interval` until the cache is dropped
    pub fn spawn_periodic_sweep(&self, interval: Duration) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        self.shared.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; startup already swept.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.sweep().await;
            }
        })
    }

    pub fn len(&self) -> usize {
        self.shared.lock_registry().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.policy.capacity()
    }

    pub fn content_available(&self) -> bool {
        self.shared.content.is_available()
    }

    pub fn now_millis(&self) -> i64 {
        self.shared.clock.now_millis()
    }
}
