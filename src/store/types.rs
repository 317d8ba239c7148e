//! Store error definitions.

use std::time::Duration;
use thiserror::Error;

use crate::alias::AliasError;

/// Errors surfaced by the update pipeline.
///
/// Processor failures never appear here; they are contained per document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The mutation lock could not be acquired within the configured bound.
    #[error("Timed out after {0:?} waiting for the tenant configuration lock")]
    LockTimeout(Duration),

    /// The alias tree document in the batch was rejected.
    #[error(transparent)]
    Alias(#[from] AliasError),
}

impl StoreError {
    /// Lock timeouts are transient; alias errors need a corrected document.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::LockTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
        assert!(err.is_retryable());

        let err = StoreError::from(AliasError::WrongAliasConfiguration("A under A".into()));
        assert_eq!(err.to_string(), "Wrong alias configuration: A under A");
        assert!(!err.is_retryable());
    }
}
