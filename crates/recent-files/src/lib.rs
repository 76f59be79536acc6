//! Recently opened documents
//!
//! Tracks which documents were opened, in which order, and where the reader
//! left off. Document bytes can be cached locally for instant reopen.
//!
//! Two stores back the registry:
//! - a [`MetadataStore`] holding the full list as one snapshot
//! - a [`ContentStore`] holding the raw bytes, keyed by fingerprint
//!
//! The content store is authoritative for whether bytes exist. The
//! `is_content_cached` flag on a record is a hint that is corrected the first
//! time a read finds it stale.

mod clock;
mod config;
mod content;
mod error;
mod events;
mod eviction;
mod format;
mod manager;
mod metadata;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RecentFilesConfig, DEFAULT_CAPACITY, DEFAULT_RETENTION};
pub use content::{open_content_store, ContentBackend, ContentStore, MemoryContentStore};
pub use error::{RecentFilesError, Result};
pub use events::{Notifier, RecentFilesEvent};
pub use eviction::{EvictionPlan, EvictionPolicy};
pub use format::{format_byte_size, format_relative_time, matches_query, record_summary};
pub use manager::{PendingContent, RecentFilesCache};
pub use metadata::{
    FileSurface, KeyValueSurface, MemorySurface, MetadataStore, SnapshotMetadataStore,
    SNAPSHOT_KEY,
};
pub use types::{
    CacheStatus, DocumentRecord, OpenedDocument, Rotation, ViewState, ViewStatePatch,
    DEFAULT_DISPLAY_NAME,
};
