//! Lifecycle and recovery tests on the filesystem backend
//!
//! Covers:
//! - Fresh boot: create, rebuild, add, shutdown, clean reboot
//! - Recovery from a marker left set by a crash
//! - Corrupt commit or missing segment file treated as a missing index
//! - Reader invalidation after mutations
//! - Reindex idempotence and synchronous removal

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use weblog_search::entity::{EntityStore, EntryRef, MemoryEntityStore, WeblogEntry};
use weblog_search::marker::{ConsistencyMarker, FileMarker, MARKER_FILE};
use weblog_search::{IndexLifecycleManager, IndexState, SearchConfig};

// =============================================================================
// Test Utilities
// =============================================================================

fn boot(temp: &TempDir, entities: &Arc<MemoryEntityStore>) -> IndexLifecycleManager {
    let manager = IndexLifecycleManager::new(
        SearchConfig::with_location(temp.path()),
        Arc::clone(entities) as Arc<dyn EntityStore>,
    )
    .unwrap();
    manager.initialize().unwrap();
    manager.wait_for_pending();
    manager
}

fn marker(temp: &TempDir) -> FileMarker {
    FileMarker::new(temp.path().join(MARKER_FILE))
}

fn seeded_store() -> Arc<MemoryEntityStore> {
    Arc::new(MemoryEntityStore::with_entries(vec![
        WeblogEntry::published("e1", "blog", "Ownership in Rust", "moves and borrows"),
        WeblogEntry::published("e2", "blog", "Lifetimes", "borrows that outlive scopes"),
        WeblogEntry::published("e3", "cooking", "Sourdough", "starter and patience"),
    ]))
}

// =============================================================================
// Fresh Boot
// =============================================================================

#[test]
fn test_fresh_boot_then_clean_reboot() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();

    let manager = boot(&temp, &entities);
    assert_eq!(manager.state(), IndexState::InconsistentAtStartup);
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 3);

    let entry = WeblogEntry::published("e4", "blog", "Traits", "dynamic dispatch");
    entities.upsert(entry.clone()).unwrap();
    manager.submit_add(entry.entry_ref()).unwrap();
    manager.wait_for_pending();
    manager.shutdown().unwrap();
    assert!(!marker(&temp).is_set().unwrap());

    let manager = boot(&temp, &entities);
    assert_eq!(manager.state(), IndexState::Consistent);
    assert!(!manager.is_inconsistent_at_startup());
    let reader = manager.get_shared_reader().unwrap();
    assert_eq!(reader.num_docs(), 4);
    assert_eq!(reader.search("dispatch").unwrap().len(), 1);
    // No rebuild on a clean reboot
    assert_eq!(manager.metrics().rebuilds, 0);
}

#[test]
fn test_disabled_search_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let mut config = SearchConfig::with_location(temp.path().join("root"));
    config.search_enabled = false;

    let manager =
        IndexLifecycleManager::new(config, seeded_store() as Arc<dyn EntityStore>).unwrap();
    manager.initialize().unwrap();
    manager.submit_add(EntryRef::new("e1", "blog")).unwrap();
    manager.submit_remove(EntryRef::new("e1", "blog")).unwrap();
    manager.submit_rebuild(None).unwrap();
    manager.shutdown().unwrap();

    assert!(!manager.is_enabled());
    assert!(manager.get_shared_reader().is_err());
    assert!(!temp.path().join("root").exists());
    assert_eq!(manager.metrics().operations_submitted, 0);
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn test_marker_left_set_forces_rebuild() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    boot(&temp, &entities).shutdown().unwrap();

    // Simulate a crash mid-mutation: marker set, index holds stale content
    entities.remove("e3").unwrap();
    marker(&temp).set().unwrap();

    let manager = boot(&temp, &entities);
    assert_eq!(manager.state(), IndexState::InconsistentAtStartup);
    let reader = manager.get_shared_reader().unwrap();
    assert_eq!(reader.num_docs(), 2);
    assert!(reader.document("e3").unwrap().is_none());

    // Rebuild cleared the marker; the startup flag stays
    assert!(!marker(&temp).is_set().unwrap());
    assert!(manager.is_inconsistent_at_startup());
}

#[test]
fn test_corrupt_commit_treated_as_missing() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    boot(&temp, &entities).shutdown().unwrap();

    fs::write(temp.path().join("index").join("meta.json"), b"{\"segments\": [").unwrap();

    let manager = boot(&temp, &entities);
    assert_eq!(manager.state(), IndexState::InconsistentAtStartup);
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 3);
}

#[test]
fn test_missing_segment_file_treated_as_missing() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    boot(&temp, &entities).shutdown().unwrap();

    let mut removed = 0;
    for entry in fs::read_dir(temp.path().join("index")).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().map_or(false, |e| e == "store") {
            fs::remove_file(&path).unwrap();
            removed += 1;
        }
    }
    assert!(removed > 0);

    let manager = boot(&temp, &entities);
    assert_eq!(manager.state(), IndexState::InconsistentAtStartup);
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 3);
}

#[test]
fn test_missing_storage_is_recreated() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    boot(&temp, &entities).shutdown().unwrap();

    fs::remove_dir_all(temp.path().join("index")).unwrap();

    let manager = boot(&temp, &entities);
    assert!(manager.is_inconsistent_at_startup());
    assert_eq!(manager.get_shared_reader().unwrap().num_docs(), 3);
}

// =============================================================================
// Operations
// =============================================================================

#[test]
fn test_reindex_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    let manager = boot(&temp, &entities);

    let mut entry = WeblogEntry::published("e1", "blog", "Ownership revisited", "drop order");
    entry.tags = vec!["rust".into()];
    entities.upsert(entry.clone()).unwrap();

    manager.submit_reindex(entry.entry_ref()).unwrap();
    manager.wait_for_pending();
    let once = manager.get_shared_reader().unwrap();
    let once_doc = once.document("e1").unwrap().unwrap();

    manager.submit_reindex(entry.entry_ref()).unwrap();
    manager.wait_for_pending();
    let twice = manager.get_shared_reader().unwrap();

    assert_eq!(twice.num_docs(), once.num_docs());
    assert_eq!(twice.document("e1").unwrap(), Some(once_doc));
    assert_eq!(twice.search("drop").unwrap().len(), 1);
    assert!(twice.search("moves").unwrap().is_empty());
}

#[test]
fn test_remove_is_synchronous() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    let manager = boot(&temp, &entities);

    manager.submit_remove(EntryRef::new("e2", "blog")).unwrap();
    // Visible without waiting
    assert!(manager.get_shared_reader().unwrap().document("e2").unwrap().is_none());

    // Removing again is not an error
    manager.submit_remove(EntryRef::new("e2", "blog")).unwrap();
}

#[test]
fn test_remove_owner_and_owner_rebuild() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    let manager = boot(&temp, &entities);

    manager.submit_remove_owner("blog").unwrap();
    manager.wait_for_pending();
    let reader = manager.get_shared_reader().unwrap();
    assert_eq!(reader.owner_documents("blog").unwrap().len(), 0);
    assert_eq!(reader.owner_documents("cooking").unwrap().len(), 1);

    manager.submit_rebuild(Some("blog")).unwrap();
    manager.wait_for_pending();
    assert_eq!(
        manager
            .get_shared_reader()
            .unwrap()
            .owner_documents("blog")
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_duplicate_add_fails_and_keeps_marker() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    let manager = boot(&temp, &entities);
    assert!(!marker(&temp).is_set().unwrap());

    let err = manager
        .execute_now(weblog_search::IndexOperation::AddEntry(EntryRef::new(
            "e1", "blog",
        )))
        .unwrap_err();
    assert_eq!(err.code(), weblog_search::SearchErrorCode::OperationFailure);
    assert!(marker(&temp).is_set().unwrap());
    assert_eq!(manager.metrics().operations_failed, 1);

    // Next startup repairs the index
    manager.shutdown().unwrap();
    assert!(marker(&temp).is_set().unwrap());
    let manager = boot(&temp, &entities);
    assert!(manager.is_inconsistent_at_startup());
    assert!(!marker(&temp).is_set().unwrap());
}

// =============================================================================
// Shared Reader
// =============================================================================

#[test]
fn test_reader_reused_until_mutation() {
    let temp = TempDir::new().unwrap();
    let entities = seeded_store();
    let manager = boot(&temp, &entities);

    let first = manager.get_shared_reader().unwrap();
    let again = manager.get_shared_reader().unwrap();
    assert_eq!(first.reader_id(), again.reader_id());

    let entry = WeblogEntry::published("e9", "blog", "Macros", "hygiene");
    entities.upsert(entry.clone()).unwrap();
    manager.submit_add(entry.entry_ref()).unwrap();
    manager.wait_for_pending();

    let after = manager.get_shared_reader().unwrap();
    assert_ne!(after.reader_id(), first.reader_id());
    assert!(after.generation() > first.generation());
    assert!(after.document("e9").unwrap().is_some());
    // Old snapshot is unaffected
    assert!(first.document("e9").unwrap().is_none());
}

#[test]
fn test_explicit_invalidation() {
    let temp = TempDir::new().unwrap();
    let manager = boot(&temp, &seeded_store());

    let first = manager.get_shared_reader().unwrap();
    manager.invalidate_reader();
    let second = manager.get_shared_reader().unwrap();
    assert_ne!(first.reader_id(), second.reader_id());
    assert_eq!(first.generation(), second.generation());
}
