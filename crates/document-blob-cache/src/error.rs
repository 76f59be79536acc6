//! Error types for the document blob cache

use std::fmt;

#[derive(Debug)]
pub enum BlobCacheError {
    /// The cache directory could not be created or opened
    Unavailable(Box<std::io::Error>),
    Io(Box<std::io::Error>),
    Index(String),
}

impl fmt::Display for BlobCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobCacheError::Unavailable(err) => write!(f, "Blob cache unavailable: {}", err),
            BlobCacheError::Io(err) => write!(f, "IO error: {}", err),
            BlobCacheError::Index(msg) => write!(f, "Index error: {}", msg),
        }
    }
}

impl std::error::Error for BlobCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobCacheError::Unavailable(err) | BlobCacheError::Io(err) => Some(err.as_ref()),
            BlobCacheError::Index(_) => None,
        }
    }
}

impl From<std::io::Error> for BlobCacheError {
    fn from(err: std::io::Error) -> Self {
        BlobCacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for BlobCacheError {
    fn from(err: serde_json::Error) -> Self {
        BlobCacheError::Index(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BlobCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_display() {
        let err = BlobCacheError::Index("expected value at line 1".to_string());
        assert_eq!(format!("{}", err), "Index error: expected value at line 1");
    }

    #[test]
    fn test_unavailable_error_has_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = BlobCacheError::Unavailable(Box::new(io));
        assert!(format!("{}", err).starts_with("Blob cache unavailable"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BlobCacheError = io.into();
        assert!(matches!(err, BlobCacheError::Io(_)));
    }
}
