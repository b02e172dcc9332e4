//! # Index Engine Errors

use tantivy::directory::error::OpenReadError;
use tantivy::TantivyError;
use thiserror::Error;

/// Result type for index engine operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised while opening, writing or reading an index
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(String),

    // Index structure errors
    #[error("No index found in directory")]
    IndexNotFound,

    #[error("Index corrupted: {0}")]
    Corrupted(String),

    #[error("Index schema mismatch: {0}")]
    SchemaMismatch(String),

    // Document errors
    #[error("Document already indexed: {0}")]
    DuplicateDocument(String),

    #[error("Invalid stored document: {0}")]
    InvalidDocument(String),

    #[error("Search engine error: {0}")]
    Engine(String),
}

impl IndexError {
    /// Wrap an io::Error with a context message
    pub fn io(context: impl AsRef<str>, err: std::io::Error) -> Self {
        IndexError::Io(format!("{}: {}", context.as_ref(), err))
    }

    /// Whether this error indicates on-disk damage rather than a transient fault
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            IndexError::Corrupted(_) | IndexError::SchemaMismatch(_)
        )
    }
}

impl From<TantivyError> for IndexError {
    fn from(err: TantivyError) -> Self {
        match err {
            TantivyError::DataCorruption(_) | TantivyError::IncompatibleIndex(_) => {
                IndexError::Corrupted(err.to_string())
            }
            // A committed index missing one of its files is damaged
            TantivyError::OpenReadError(OpenReadError::FileDoesNotExist(ref path)) => {
                IndexError::Corrupted(format!("missing index file {}", path.display()))
            }
            TantivyError::SchemaError(_) => IndexError::SchemaMismatch(err.to_string()),
            TantivyError::IoError(_) | TantivyError::OpenReadError(_) => {
                IndexError::Io(err.to_string())
            }
            other => IndexError::Engine(other.to_string()),
        }
    }
}
