//! # Storage Backends
//!
//! Where durable index files live. A backend hands out a tantivy
//! [`Directory`] over its files and knows whether that storage exists at all.
//!
//! - [`FsBackend`]: local filesystem directory
//! - [`DocStoreBackend`]: collection in a document store
//!
//! Purging (`open_directory(true)`) must leave storage either intact or
//! empty after a crash (never half-deleted), since recovery treats an empty
//! directory as "no index" and rebuilds.

mod docstore;
mod errors;
mod filesystem;

use std::fmt;
use std::sync::Arc;

pub use docstore::{
    DocStoreBackend, DocStoreDirectory, DocumentStore, FileDocumentStore, MemoryDocumentStore,
    INCONSISTENT_COLLECTION, INDEX_COLLECTION,
};
pub use errors::{BackendError, BackendResult};
pub use filesystem::FsBackend;

pub(crate) use filesystem::sync_dir;

use crate::config::{BackendKind, SearchConfig};
use crate::engine::Directory;
use crate::marker::{CollectionMarker, ConsistencyMarker, FileMarker, MARKER_FILE};

/// Durable home of the index files
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Open the index directory, first deleting every file if `purge`.
    ///
    /// The storage must exist; see [`StorageBackend::create`].
    fn open_directory(&self, purge: bool) -> BackendResult<Box<dyn Directory>>;

    /// Whether the index storage exists
    fn exists(&self) -> BackendResult<bool>;

    /// Create the index storage
    fn create(&self) -> BackendResult<()>;

    /// Human-readable location for diagnostics
    fn location(&self) -> String;
}

/// Build the backend and its sibling consistency marker from configuration.
///
/// Performs no I/O.
pub fn from_config(config: &SearchConfig) -> (Arc<dyn StorageBackend>, Arc<dyn ConsistencyMarker>) {
    let location = config.storage_location.clone();
    match config.backend {
        BackendKind::Filesystem => (
            Arc::new(FsBackend::new(location.clone())),
            Arc::new(FileMarker::new(location.join(MARKER_FILE))),
        ),
        BackendKind::DocumentStore => {
            let store: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(location.clone()));
            (
                Arc::new(DocStoreBackend::new(
                    Arc::clone(&store),
                    location.display().to_string(),
                )),
                Arc::new(CollectionMarker::new(store)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_filesystem() {
        let temp = TempDir::new().unwrap();
        let config = SearchConfig::with_location(temp.path());
        let (backend, marker) = from_config(&config);

        assert!(backend.location().ends_with("index"));
        assert!(!marker.is_set().unwrap());
        // Construction touches nothing on disk
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_from_config_document_store() {
        let temp = TempDir::new().unwrap();
        let mut config = SearchConfig::with_location(temp.path());
        config.backend = BackendKind::DocumentStore;
        let (backend, marker) = from_config(&config);

        backend.create().unwrap();
        marker.set().unwrap();
        assert!(temp.path().join(INDEX_COLLECTION).is_dir());
        assert!(temp.path().join(INCONSISTENT_COLLECTION).is_dir());
    }
}
