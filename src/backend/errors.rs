//! # Storage Backend Errors

use thiserror::Error;

use crate::engine::IndexError;

/// Result type for backend and marker operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by storage backends, document stores and markers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid record {key}: {reason}")]
    InvalidRecord { key: String, reason: String },

    #[error("Storage misconfigured: {0}")]
    Misconfigured(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl BackendError {
    /// Wrap an io::Error with a context message
    pub fn io(context: impl AsRef<str>, err: std::io::Error) -> Self {
        BackendError::Io(format!("{}: {}", context.as_ref(), err))
    }
}

impl From<BackendError> for IndexError {
    fn from(err: BackendError) -> Self {
        IndexError::Io(err.to_string())
    }
}
