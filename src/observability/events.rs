//! Observable lifecycle events
//!
//! Attached to log records as the `event` field so log consumers can match
//! on stable names instead of message text.

use std::fmt;

/// Observable events of the search subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Search disabled by configuration
    SearchDisabled,
    /// Initialization started
    InitStart,
    /// Index consistent and ready
    IndexReady,
    /// Index found inconsistent at startup
    IndexInconsistent,
    /// Shutdown started
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Marker and storage
    /// Consistency marker set
    MarkerSet,
    /// Consistency marker cleared
    MarkerCleared,
    /// Durable storage purged
    StoragePurged,
    /// Durable storage created
    StorageCreated,
    /// RAM overlay loaded from durable storage
    RamOverlayLoaded,

    // Operations
    /// Operation accepted by the scheduler
    OperationScheduled,
    /// Operation finished successfully
    OperationComplete,
    /// Operation failed
    OperationFailed,
    /// Operation dropped by the scheduler
    OperationDropped,
    /// RAM overlay written to durable storage
    FlushComplete,
    /// Flush failed; durable storage purged
    FlushFailed,

    // Readers
    /// Shared reader opened
    ReaderOpened,
    /// Shared reader dropped
    ReaderInvalidated,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SearchDisabled => "SEARCH_DISABLED",
            Event::InitStart => "SEARCH_INIT_START",
            Event::IndexReady => "SEARCH_INDEX_READY",
            Event::IndexInconsistent => "SEARCH_INDEX_INCONSISTENT",
            Event::ShutdownStart => "SEARCH_SHUTDOWN_START",
            Event::ShutdownComplete => "SEARCH_SHUTDOWN_COMPLETE",
            Event::MarkerSet => "SEARCH_MARKER_SET",
            Event::MarkerCleared => "SEARCH_MARKER_CLEARED",
            Event::StoragePurged => "SEARCH_STORAGE_PURGED",
            Event::StorageCreated => "SEARCH_STORAGE_CREATED",
            Event::RamOverlayLoaded => "SEARCH_RAM_OVERLAY_LOADED",
            Event::OperationScheduled => "SEARCH_OPERATION_SCHEDULED",
            Event::OperationComplete => "SEARCH_OPERATION_COMPLETE",
            Event::OperationFailed => "SEARCH_OPERATION_FAILED",
            Event::OperationDropped => "SEARCH_OPERATION_DROPPED",
            Event::FlushComplete => "SEARCH_FLUSH_COMPLETE",
            Event::FlushFailed => "SEARCH_FLUSH_FAILED",
            Event::ReaderOpened => "SEARCH_READER_OPENED",
            Event::ReaderInvalidated => "SEARCH_READER_INVALIDATED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_prefixed() {
        for event in [
            Event::InitStart,
            Event::MarkerSet,
            Event::OperationDropped,
            Event::ReaderInvalidated,
        ] {
            assert!(event.as_str().starts_with("SEARCH_"));
            assert_eq!(event.to_string(), event.as_str());
        }
    }
}
