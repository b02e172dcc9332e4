//! Lifecycle scenarios on the document-store backend
//!
//! The same recovery contract must hold when index files live in the `INDEX`
//! collection and the marker is the `INCONSISTENT` collection.

use std::sync::Arc;

use tempfile::TempDir;
use weblog_search::backend::{
    DocStoreBackend, DocumentStore, MemoryDocumentStore, INCONSISTENT_COLLECTION,
    INDEX_COLLECTION,
};
use weblog_search::config::BackendKind;
use weblog_search::entity::{EntityStore, MemoryEntityStore, WeblogEntry};
use weblog_search::marker::CollectionMarker;
use weblog_search::scheduler::ThreadTaskRunner;
use weblog_search::{IndexLifecycleManager, IndexState, SearchConfig};

// =============================================================================
// Test Utilities
// =============================================================================

fn entities() -> Arc<MemoryEntityStore> {
    Arc::new(MemoryEntityStore::with_entries(vec![
        WeblogEntry::published("p1", "photos", "Night sky", "long exposure"),
        WeblogEntry::published("p2", "photos", "Harbor", "fog at dawn"),
    ]))
}

/// Boot against a shared in-memory store, as if the process restarted
fn boot(store: &Arc<MemoryDocumentStore>, entities: &Arc<MemoryEntityStore>) -> IndexLifecycleManager {
    let store: Arc<dyn DocumentStore> = Arc::clone(store) as Arc<dyn DocumentStore>;
    let manager = IndexLifecycleManager::from_parts(
        SearchConfig::default(),
        Arc::new(DocStoreBackend::new(Arc::clone(&store), "memory")),
        Arc::new(CollectionMarker::new(store)),
        Arc::clone(entities) as Arc<dyn EntityStore>,
        Arc::new(ThreadTaskRunner::new(16).unwrap()),
    );
    manager.initialize().unwrap();
    manager.wait_for_pending();
    manager
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_fresh_boot_creates_collections() {
    let store = Arc::new(MemoryDocumentStore::new());
    let entities = entities();

    let manager = boot(&store, &entities);
    assert_eq!(manager.state(), IndexState::InconsistentAtStartup);
    assert!(store.collection_exists(INDEX_COLLECTION).unwrap());
    // Full rebuild in durable mode clears the marker
    assert!(!store.collection_exists(INCONSISTENT_COLLECTION).unwrap());
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 2);
    manager.shutdown().unwrap();

    let manager = boot(&store, &entities);
    assert_eq!(manager.state(), IndexState::Consistent);
    assert_eq!(manager.get_shared_reader().unwrap().search("fog").unwrap().len(), 1);
}

#[test]
fn test_marker_collection_forces_recovery() {
    let store = Arc::new(MemoryDocumentStore::new());
    let entities = entities();
    boot(&store, &entities).shutdown().unwrap();

    entities
        .upsert(WeblogEntry::published("p3", "photos", "Dunes", "wind ripples"))
        .unwrap();
    store.create_collection(INCONSISTENT_COLLECTION).unwrap();

    let manager = boot(&store, &entities);
    assert!(manager.is_inconsistent_at_startup());
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 3);
    assert!(!store.collection_exists(INCONSISTENT_COLLECTION).unwrap());
}

#[test]
fn test_mutations_land_in_index_collection() {
    let store = Arc::new(MemoryDocumentStore::new());
    let entities = entities();
    let manager = boot(&store, &entities);
    let before = store.list(INDEX_COLLECTION).unwrap();

    let entry = WeblogEntry::published("p4", "photos", "Glacier", "blue ice");
    entities.upsert(entry.clone()).unwrap();
    manager.submit_add(entry.entry_ref()).unwrap();
    manager.wait_for_pending();

    let after = store.list(INDEX_COLLECTION).unwrap();
    assert_ne!(before, after);
    assert!(after.iter().any(|k| k == "meta.json"));

    manager.submit_remove(entry.entry_ref()).unwrap();
    assert!(manager.get_shared_reader().unwrap().document("p4").unwrap().is_none());
}

#[test]
fn test_file_document_store_from_config() {
    let temp = TempDir::new().unwrap();
    let mut config = SearchConfig::with_location(temp.path());
    config.backend = BackendKind::DocumentStore;
    let entities = entities();

    let manager =
        IndexLifecycleManager::new(config.clone(), Arc::clone(&entities) as Arc<dyn EntityStore>)
            .unwrap();
    manager.initialize().unwrap();
    manager.wait_for_pending();
    assert!(temp.path().join(INDEX_COLLECTION).is_dir());
    manager.shutdown().unwrap();
    assert!(!temp.path().join(INCONSISTENT_COLLECTION).exists());

    let manager =
        IndexLifecycleManager::new(config, Arc::clone(&entities) as Arc<dyn EntityStore>).unwrap();
    manager.initialize().unwrap();
    assert_eq!(manager.state(), IndexState::Consistent);
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 2);
}
