//! Cache and backing store error definitions.

use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by a [`BackingStore`](super::BackingStore) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackingError {
    #[error("Configuration not found: {0}")]
    NotFound(String),

    /// The expected content hash did not match the stored document.
    #[error("Configuration {path} was modified concurrently")]
    ConcurrentModification { path: String },

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for backing store operations.
pub type BackingResult<T> = Result<T, BackingError>;

/// Errors surfaced by the proxy cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backing(#[from] BackingError),
}

impl CacheError {
    /// Lock timeouts and hash conflicts can be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            CacheError::Store(err) => err.is_retryable(),
            CacheError::Backing(BackingError::ConcurrentModification { .. }) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound(_) | CacheError::Backing(BackingError::NotFound(_))
        )
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_classification() {
        assert!(CacheError::from(StoreError::LockTimeout(Duration::from_secs(1))).is_retryable());
        assert!(CacheError::from(BackingError::ConcurrentModification {
            path: "/a".into()
        })
        .is_retryable());
        assert!(!CacheError::NotFound("/a".into()).is_retryable());
        assert!(CacheError::from(BackingError::NotFound("/a".into())).is_not_found());
    }
}
