//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index metadata for one cached blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobEntry {
    pub key: String,
    pub file_name: String,
    pub size: u64,
    pub cached_at: DateTime<Utc>,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
