//! Error types for the recent files cache

use std::fmt;

#[derive(Debug)]
pub enum RecentFilesError {
    /// The persisted metadata snapshot could not be parsed
    StorageCorrupt(String),
    /// The blob surface could not be opened
    StorageUnavailable(String),
    /// Writing document content to the blob surface failed
    CacheWriteFailed(String),
    /// No record exists for the fingerprint
    UnknownDocument(String),
    /// A view state value outside its allowed range
    InvalidViewState(String),
    Io(Box<std::io::Error>),
    Serialization(String),
}

impl fmt::Display for RecentFilesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecentFilesError::StorageCorrupt(msg) => write!(f, "Storage corrupt: {}", msg),
            RecentFilesError::StorageUnavailable(msg) => {
                write!(f, "Storage unavailable: {}", msg)
            }
            RecentFilesError::CacheWriteFailed(msg) => write!(f, "Cache write failed: {}", msg),
            RecentFilesError::UnknownDocument(fingerprint) => {
                write!(f, "Unknown document: {}", fingerprint)
            }
            RecentFilesError::InvalidViewState(msg) => write!(f, "Invalid view state: {}", msg),
            RecentFilesError::Io(err) => write!(f, "IO error: {}", err),
            RecentFilesError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for RecentFilesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecentFilesError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RecentFilesError {
    fn from(err: std::io::Error) -> Self {
        RecentFilesError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for RecentFilesError {
    fn from(err: serde_json::Error) -> Self {
        RecentFilesError::Serialization(err.to_string())
    }
}

impl From<document_blob_cache::BlobCacheError> for RecentFilesError {
    fn from(err: document_blob_cache::BlobCacheError) -> Self {
        use document_blob_cache::BlobCacheError;
        match err {
            BlobCacheError::Unavailable(e) => RecentFilesError::StorageUnavailable(e.to_string()),
            BlobCacheError::Io(e) => RecentFilesError::Io(e),
            BlobCacheError::Index(msg) => RecentFilesError::StorageCorrupt(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecentFilesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_document_display() {
        let err = RecentFilesError::UnknownDocument("abc123".to_string());
        assert_eq!(format!("{}", err), "Unknown document: abc123");
    }

    #[test]
    fn test_cache_write_failed_display() {
        let err = RecentFilesError::CacheWriteFailed("disk full".to_string());
        assert_eq!(format!("{}", err), "Cache write failed: disk full");
    }

    #[test]
    fn test_blob_unavailable_maps_to_storage_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: RecentFilesError =
            document_blob_cache::BlobCacheError::Unavailable(Box::new(io)).into();
        assert!(matches!(err, RecentFilesError::StorageUnavailable(_)));
    }

    #[test]
    fn test_io_error_has_source() {
        let err: RecentFilesError = std::io::Error::other("boom").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
