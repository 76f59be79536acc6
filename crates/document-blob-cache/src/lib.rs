//! File-based document blob cache with an age index
//!
//! Stores binary blobs on disk, one file per key, with an in-memory index that
//! is mirrored to `index.json`. A secondary ordering over the time each blob was
//! cached supports range scans and retention sweeps.

mod cache;
mod error;
mod types;

pub use cache::BlobCache;
pub use error::{BlobCacheError, Result};
pub use types::{BlobEntry, CacheStats};
