use thiserror::Error;

/// Configuration errors raised while building a [`NavigationHistory`].
///
/// These are the only errors that cross the history's public API; everything
/// that goes wrong at the storage boundary is logged and absorbed.
///
/// [`NavigationHistory`]: crate::history::NavigationHistory
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("capacity has to be at least 1, got {0}")]
    InvalidCapacity(usize),
    #[error("invalid storage key '{0}': keys must be non-empty and free of whitespace and path separators")]
    InvalidKey(String),
    #[error("a persisted history needs a persistence key")]
    MissingKey,
    #[error("persistence key '{0}' given without a storage backend")]
    MissingStorage(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded while writing '{key}' ({needed} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}
