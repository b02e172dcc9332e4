//! Search lifecycle error types
//!
//! Error codes:
//! - SEARCH_STORAGE_UNAVAILABLE (FATAL at startup)
//! - SEARCH_MARKER_PERSISTENCE_FAILED (ERROR)
//! - SEARCH_OPERATION_FAILED (ERROR)
//! - SEARCH_SCHEDULING_FAILED (ERROR)
//! - SEARCH_READER_UNAVAILABLE (ERROR)
//! - SEARCH_CONFIG_INVALID (FATAL)
//!
//! Per-operation errors never corrupt the marker contract: the marker stays
//! set until a later successful rebuild or flush clears it.

use std::fmt;

use crate::backend::BackendError;
use crate::engine::IndexError;
use crate::entity::EntityError;

/// Severity levels for search errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed, subsystem keeps serving
    Error,
    /// Subsystem must not claim readiness
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Search error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchErrorCode {
    /// Backend cannot be opened, created or purged
    StorageUnavailable,
    /// Marker could not be set or cleared
    MarkerPersistenceFailure,
    /// A single index mutation failed
    OperationFailure,
    /// The task runner rejected an operation
    SchedulingFailure,
    /// A shared reader could not be opened
    ReaderUnavailable,
    /// Configuration is invalid
    ConfigInvalid,
}

impl SearchErrorCode {
    /// Returns the string code
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchErrorCode::StorageUnavailable => "SEARCH_STORAGE_UNAVAILABLE",
            SearchErrorCode::MarkerPersistenceFailure => "SEARCH_MARKER_PERSISTENCE_FAILED",
            SearchErrorCode::OperationFailure => "SEARCH_OPERATION_FAILED",
            SearchErrorCode::SchedulingFailure => "SEARCH_SCHEDULING_FAILED",
            SearchErrorCode::ReaderUnavailable => "SEARCH_READER_UNAVAILABLE",
            SearchErrorCode::ConfigInvalid => "SEARCH_CONFIG_INVALID",
        }
    }

    /// Returns the severity level for this error code
    pub fn severity(&self) -> Severity {
        match self {
            SearchErrorCode::StorageUnavailable | SearchErrorCode::ConfigInvalid => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for SearchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Underlying cause of a search error
#[derive(Debug)]
enum Cause {
    Backend(BackendError),
    Index(IndexError),
    Entity(EntityError),
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Backend(e) => write!(f, "{}", e),
            Cause::Index(e) => write!(f, "{}", e),
            Cause::Entity(e) => write!(f, "{}", e),
        }
    }
}

/// Search error with full context
#[derive(Debug)]
pub struct SearchError {
    code: SearchErrorCode,
    message: String,
    cause: Option<Cause>,
}

impl SearchError {
    fn new(code: SearchErrorCode, message: impl Into<String>, cause: Option<Cause>) -> Self {
        Self {
            code,
            message: message.into(),
            cause,
        }
    }

    /// Storage could not be opened, created or purged
    pub fn storage_unavailable(message: impl Into<String>, source: BackendError) -> Self {
        Self::new(
            SearchErrorCode::StorageUnavailable,
            message,
            Some(Cause::Backend(source)),
        )
    }

    /// Storage failure surfaced by the index engine
    pub fn storage_index_failure(message: impl Into<String>, source: IndexError) -> Self {
        Self::new(
            SearchErrorCode::StorageUnavailable,
            message,
            Some(Cause::Index(source)),
        )
    }

    /// Marker could not be set or cleared
    pub fn marker_failed(message: impl Into<String>, source: BackendError) -> Self {
        Self::new(
            SearchErrorCode::MarkerPersistenceFailure,
            message,
            Some(Cause::Backend(source)),
        )
    }

    /// An operation failed in the index engine
    pub fn operation_failed(message: impl Into<String>, source: IndexError) -> Self {
        Self::new(
            SearchErrorCode::OperationFailure,
            message,
            Some(Cause::Index(source)),
        )
    }

    /// An operation failed in a backend
    pub fn operation_storage_failed(message: impl Into<String>, source: BackendError) -> Self {
        Self::new(
            SearchErrorCode::OperationFailure,
            message,
            Some(Cause::Backend(source)),
        )
    }

    /// Entries could not be read from the entity store
    pub fn entity_failed(message: impl Into<String>, source: EntityError) -> Self {
        Self::new(
            SearchErrorCode::OperationFailure,
            message,
            Some(Cause::Entity(source)),
        )
    }

    /// An operation failed without an underlying cause
    pub fn operation_aborted(message: impl Into<String>) -> Self {
        Self::new(SearchErrorCode::OperationFailure, message, None)
    }

    /// The task runner rejected an operation
    pub fn scheduling_failed(message: impl Into<String>) -> Self {
        Self::new(SearchErrorCode::SchedulingFailure, message, None)
    }

    /// A shared reader could not be opened
    pub fn reader_unavailable(message: impl Into<String>, source: IndexError) -> Self {
        Self::new(
            SearchErrorCode::ReaderUnavailable,
            message,
            Some(Cause::Index(source)),
        )
    }

    /// No reader can be served in the current state
    pub fn reader_refused(message: impl Into<String>) -> Self {
        Self::new(SearchErrorCode::ReaderUnavailable, message, None)
    }

    /// Configuration is invalid
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(SearchErrorCode::ConfigInvalid, message, None)
    }

    /// Returns the error code
    pub fn code(&self) -> SearchErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the severity of this error
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Whether the subsystem must not claim readiness after this error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Underlying index engine error, if any
    pub fn index_error(&self) -> Option<&IndexError> {
        match &self.cause {
            Some(Cause::Index(e)) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref cause) = self.cause {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(Cause::Backend(e)) => Some(e),
            Some(Cause::Index(e)) => Some(e),
            Some(Cause::Entity(e)) => Some(e),
            None => None,
        }
    }
}

/// Result type for search lifecycle operations
pub type SearchResult<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SearchErrorCode::StorageUnavailable.as_str(),
            "SEARCH_STORAGE_UNAVAILABLE"
        );
        assert_eq!(
            SearchErrorCode::MarkerPersistenceFailure.as_str(),
            "SEARCH_MARKER_PERSISTENCE_FAILED"
        );
        assert_eq!(
            SearchErrorCode::SchedulingFailure.as_str(),
            "SEARCH_SCHEDULING_FAILED"
        );
    }

    #[test]
    fn test_startup_errors_are_fatal() {
        let err = SearchError::storage_unavailable("open", BackendError::Io("disk".into()));
        assert!(err.is_fatal());
        assert!(SearchError::config_invalid("bad").is_fatal());
    }

    #[test]
    fn test_operation_errors_not_fatal() {
        let err = SearchError::operation_failed("add", IndexError::DuplicateDocument("e1".into()));
        assert!(!err.is_fatal());
        assert_eq!(
            err.index_error(),
            Some(&IndexError::DuplicateDocument("e1".into()))
        );
        assert!(!SearchError::scheduling_failed("full").is_fatal());
    }

    #[test]
    fn test_display_contains_cause() {
        let err = SearchError::marker_failed("set marker", BackendError::Io("read-only fs".into()));
        let display = err.to_string();
        assert!(display.contains("ERROR"));
        assert!(display.contains("SEARCH_MARKER_PERSISTENCE_FAILED"));
        assert!(display.contains("caused by"));
        assert!(display.contains("read-only fs"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err = SearchError::reader_unavailable("open", IndexError::IndexNotFound);
        assert!(err.source().is_some());
        assert!(SearchError::scheduling_failed("x").source().is_none());
    }
}
