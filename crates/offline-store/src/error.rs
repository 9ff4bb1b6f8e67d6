//! Store error types.

use offline_core::ProxyError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when using the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend operation failed.
    #[error("Store operation failed: {0}")]
    BackendError(String),
}

impl From<StoreError> for ProxyError {
    fn from(err: StoreError) -> Self {
        ProxyError::Store(err.to_string())
    }
}
