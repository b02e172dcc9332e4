//! Document-store consistency marker: the existence of the `INCONSISTENT`
//! collection.

use std::sync::Arc;

use crate::backend::{BackendResult, DocumentStore, INCONSISTENT_COLLECTION};

use super::ConsistencyMarker;

/// Consistency marker stored as a collection in a document store
#[derive(Debug, Clone)]
pub struct CollectionMarker {
    store: Arc<dyn DocumentStore>,
}

impl CollectionMarker {
    /// Marker over `store`; no I/O is performed
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl ConsistencyMarker for CollectionMarker {
    fn is_set(&self) -> BackendResult<bool> {
        self.store.collection_exists(INCONSISTENT_COLLECTION)
    }

    fn set(&self) -> BackendResult<()> {
        self.store.create_collection(INCONSISTENT_COLLECTION)
    }

    fn clear(&self) -> BackendResult<()> {
        self.store.drop_collection(INCONSISTENT_COLLECTION)
    }
}
