//! Index core
//!
//! State shared by the lifecycle manager and the background worker: the
//! storage backend, the consistency marker, the authoritative index (the RAM
//! overlay in RAM mode, the durable index otherwise) and the cached shared
//! reader. Executes one [`IndexOperation`] at a time; the scheduler
//! guarantees no two run concurrently.
//!
//! # Marker discipline
//!
//! - Set before any mutation touches the authoritative index
//! - Durable mode: cleared after the commit succeeds
//! - RAM mode: cleared only by a successful flush
//! - Never cleared while a repair is pending: from an inconsistent startup
//!   until its full rebuild succeeds, and from a failed mutation until a
//!   later full rebuild succeeds

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::backend::StorageBackend;
use crate::config::SearchConfig;
use crate::crash_point::{maybe_crash, points};
use crate::engine::{
    Analyzer, Directory, IndexDocument, IndexEdit, IndexError, IndexReader, IndexResult,
    SearchIndex,
};
use crate::entity::{EntityStore, EntryRef};
use crate::marker::ConsistencyMarker;
use crate::observability::{Event, MetricsRegistry};
use crate::scheduler::OperationExecutor;

use super::errors::{SearchError, SearchResult};
use super::operation::IndexOperation;

/// Outcome of startup recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recovery {
    /// Durable index trusted as-is
    Consistent,
    /// Index must be rebuilt from the entity store
    RebuildRequired,
}

#[derive(Debug)]
pub(crate) struct IndexCore {
    config: SearchConfig,
    backend: Arc<dyn StorageBackend>,
    marker: Arc<dyn ConsistencyMarker>,
    entities: Arc<dyn EntityStore>,
    analyzer: Analyzer,
    /// Installed by recovery, released at shutdown
    index: RwLock<Option<Arc<SearchIndex>>>,
    /// Readers share, writers and reader swaps exclude
    index_lock: RwLock<()>,
    reader: Mutex<Option<Arc<IndexReader>>>,
    /// A full rebuild is owed and has not yet succeeded
    repair_pending: AtomicBool,
    mutations_since_flush: AtomicU64,
    metrics: Arc<MetricsRegistry>,
}

impl IndexCore {
    pub(crate) fn new(
        config: SearchConfig,
        backend: Arc<dyn StorageBackend>,
        marker: Arc<dyn ConsistencyMarker>,
        entities: Arc<dyn EntityStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let analyzer = Analyzer::new(config.max_field_tokens);
        Self {
            config,
            backend,
            marker,
            entities,
            analyzer,
            index: RwLock::new(None),
            index_lock: RwLock::new(()),
            reader: Mutex::new(None),
            repair_pending: AtomicBool::new(false),
            mutations_since_flush: AtomicU64::new(0),
            metrics,
        }
    }

    pub(crate) fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub(crate) fn uses_ram(&self) -> bool {
        self.config.use_ram_acceleration
    }

    /// Whether the marker must stay set until a full rebuild succeeds
    pub(crate) fn repair_pending(&self) -> bool {
        self.repair_pending.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Bring storage, marker and the authoritative index into a usable state
    pub(crate) fn recover(&self) -> SearchResult<Recovery> {
        let location = self.backend.location();
        let mut inconsistent = false;

        let marker_set = self
            .marker
            .is_set()
            .map_err(|e| SearchError::marker_failed("Failed to read consistency marker", e))?;

        if marker_set {
            warn!(
                event = %Event::IndexInconsistent,
                location = %location,
                "consistency marker present at startup, purging durable index"
            );
            self.backend.open_directory(true).map_err(|e| {
                SearchError::storage_unavailable(format!("Failed to purge {}", location), e)
            })?;
            info!(event = %Event::StoragePurged, location = %location, "durable index purged");
            inconsistent = true;
        } else {
            let exists = self.backend.exists().map_err(|e| {
                SearchError::storage_unavailable(format!("Failed to check {}", location), e)
            })?;
            if !exists {
                self.backend.create().map_err(|e| {
                    SearchError::storage_unavailable(format!("Failed to create {}", location), e)
                })?;
                info!(event = %Event::StorageCreated, location = %location, "index storage created");
                inconsistent = true;
            }
            // Stays set until this startup proves the index trustworthy
            self.set_marker()?;
        }

        let durable = self.open_storage(false)?;
        match self.open_durable(durable)? {
            Some(durable) if self.uses_ram() => {
                let ram = self.empty_ram_index()?;
                match Self::copy_documents(&durable, &ram) {
                    Ok(documents) => {
                        info!(
                            event = %Event::RamOverlayLoaded,
                            documents,
                            "durable index copied into RAM"
                        );
                        self.install_index(ram);
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "failed to copy durable index into RAM, starting empty"
                        );
                        self.install_index(self.empty_ram_index()?);
                        inconsistent = true;
                    }
                }
                durable.close();
            }
            Some(durable) => self.install_index(durable),
            None if self.uses_ram() => {
                self.install_index(self.empty_ram_index()?);
                inconsistent = true;
            }
            None => {
                // Whatever is there is unusable; start from an empty directory
                let dir = self.open_storage(true)?;
                let index = SearchIndex::create(dir, self.analyzer).map_err(|e| {
                    SearchError::storage_index_failure(
                        format!("Failed to create empty index in {}", location),
                        e,
                    )
                })?;
                self.install_index(index);
                inconsistent = true;
            }
        }

        if inconsistent {
            self.repair_pending.store(true, Ordering::SeqCst);
            return Ok(Recovery::RebuildRequired);
        }
        self.clear_marker()?;
        Ok(Recovery::Consistent)
    }

    fn open_storage(&self, purge: bool) -> SearchResult<Box<dyn Directory>> {
        self.backend.open_directory(purge).map_err(|e| {
            SearchError::storage_unavailable(
                format!("Failed to open {}", self.backend.location()),
                e,
            )
        })
    }

    /// Open and verify the durable index; `None` if missing or damaged
    fn open_durable(&self, dir: Box<dyn Directory>) -> SearchResult<Option<SearchIndex>> {
        let opened = SearchIndex::open(dir, self.analyzer)
            .and_then(|index| index.validate().map(|()| index));
        match opened {
            Ok(index) => {
                debug!(
                    generation = index.generation(),
                    "durable index readable"
                );
                Ok(Some(index))
            }
            Err(IndexError::IndexNotFound) => Ok(None),
            Err(e) if e.is_corruption() => {
                warn!(error = %e, "durable index unreadable, treating as missing");
                Ok(None)
            }
            Err(e) => Err(SearchError::storage_index_failure(
                "Failed to read durable index",
                e,
            )),
        }
    }

    fn empty_ram_index(&self) -> SearchResult<SearchIndex> {
        SearchIndex::create_in_ram(self.analyzer)
            .map_err(|e| SearchError::storage_index_failure("Failed to create RAM index", e))
    }

    /// Replace every document of `target` with those of `source`
    fn copy_documents(source: &SearchIndex, target: &SearchIndex) -> IndexResult<usize> {
        let documents = source.reader()?.all_documents()?;
        let count = documents.len();
        target.edit(|edit| {
            edit.delete_all()?;
            for doc in documents {
                edit.update_document(doc)?;
            }
            Ok(count)
        })
    }

    fn install_index(&self, index: SearchIndex) {
        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(index));
    }

    fn current_index(&self) -> IndexResult<Arc<SearchIndex>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(IndexError::IndexNotFound)
    }

    // =========================================================================
    // Marker
    // =========================================================================

    fn set_marker(&self) -> SearchResult<()> {
        let already = self
            .marker
            .is_set()
            .map_err(|e| SearchError::marker_failed("Failed to read consistency marker", e))?;
        if !already {
            self.marker
                .set()
                .map_err(|e| SearchError::marker_failed("Failed to set consistency marker", e))?;
            debug!(event = %Event::MarkerSet, "consistency marker set");
        }
        Ok(())
    }

    fn clear_marker(&self) -> SearchResult<()> {
        self.marker
            .clear()
            .map_err(|e| SearchError::marker_failed("Failed to clear consistency marker", e))?;
        debug!(event = %Event::MarkerCleared, "consistency marker cleared");
        Ok(())
    }

    /// Clear the marker unless a full rebuild is still owed
    pub(crate) fn clear_marker_if_repaired(&self) -> SearchResult<()> {
        if self.repair_pending() {
            warn!("index awaiting full rebuild, consistency marker left set");
            return Ok(());
        }
        self.clear_marker()
    }

    // =========================================================================
    // Readers
    // =========================================================================

    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.index_lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.index_lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached_reader(&self) -> MutexGuard<'_, Option<Arc<IndexReader>>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached reader over the authoritative index, opened on demand
    pub(crate) fn shared_reader(&self) -> SearchResult<Arc<IndexReader>> {
        let _read = self.read_guard();
        let mut cached = self.cached_reader();
        if let Some(reader) = cached.as_ref() {
            return Ok(Arc::clone(reader));
        }

        let reader = self
            .current_index()
            .and_then(|index| index.reader())
            .map_err(|e| SearchError::reader_unavailable("Failed to open index reader", e))?;
        let reader = Arc::new(reader);

        self.metrics.increment_readers_opened();
        debug!(
            event = %Event::ReaderOpened,
            reader_id = %reader.reader_id(),
            generation = reader.generation(),
            "shared reader opened"
        );
        *cached = Some(Arc::clone(&reader));
        Ok(reader)
    }

    /// Drop the cached reader so the next request sees the latest commit
    pub(crate) fn invalidate_reader(&self) {
        let _write = self.write_guard();
        self.drop_reader_locked();
    }

    /// Caller holds the write lock
    fn drop_reader_locked(&self) {
        if let Some(reader) = self.cached_reader().take() {
            debug!(
                event = %Event::ReaderInvalidated,
                reader_id = %reader.reader_id(),
                "shared reader invalidated"
            );
        }
    }

    /// Apply `edit` to the authoritative index and commit it
    fn mutate<T>(
        &self,
        op: &IndexOperation,
        edit: impl FnOnce(&mut IndexEdit<'_>) -> IndexResult<T>,
    ) -> SearchResult<T> {
        self.set_marker()?;
        let index = self.current_index().map_err(|e| {
            SearchError::operation_failed(format!("{}: index unavailable", op), e)
        })?;

        let _write = self.write_guard();
        let value = index
            .edit(edit)
            .map_err(|e| SearchError::operation_failed(op.to_string(), e))?;
        self.drop_reader_locked();
        Ok(value)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn fetch_document(&self, entry: &EntryRef) -> SearchResult<Option<IndexDocument>> {
        let fetched = self.entities.fetch_entry(&entry.entry_id).map_err(|e| {
            SearchError::entity_failed(format!("Failed to fetch entry {}", entry), e)
        })?;
        Ok(fetched.and_then(|e| e.to_document()))
    }

    fn add_entry(&self, op: &IndexOperation, entry: &EntryRef) -> SearchResult<()> {
        let Some(doc) = self.fetch_document(entry)? else {
            debug!(entry = %entry, "entry missing or unpublished, not indexed");
            return Ok(());
        };
        self.mutate(op, |edit| edit.add_document(doc))
    }

    fn reindex_entry(&self, op: &IndexOperation, entry: &EntryRef) -> SearchResult<()> {
        let doc = self.fetch_document(entry)?;
        self.mutate(op, |edit| match doc {
            Some(doc) => edit.update_document(doc),
            None => {
                // No longer published: drop whatever was indexed
                edit.delete_document(&entry.entry_id)?;
                Ok(())
            }
        })
    }

    fn remove_entry(&self, op: &IndexOperation, entry: &EntryRef) -> SearchResult<()> {
        let removed = self.mutate(op, |edit| edit.delete_document(&entry.entry_id))?;
        if !removed {
            debug!(entry = %entry, "entry was not indexed");
        }
        Ok(())
    }

    fn rebuild(&self, op: &IndexOperation, owner: Option<&str>) -> SearchResult<()> {
        let scope = owner.unwrap_or("*");
        info!(owner = scope, "rebuilding index");

        // Fetched before taking the index lock
        let entries = self.entities.entries_for_owner(owner).map_err(|e| {
            SearchError::entity_failed(format!("Failed to list entries for {}", scope), e)
        })?;
        let documents: Vec<IndexDocument> =
            entries.iter().filter_map(|e| e.to_document()).collect();
        let indexed = documents.len();

        let removed = self.mutate(op, |edit| {
            let removed = match owner {
                Some(owner) => edit.delete_owner(owner)?,
                None => edit.delete_all()?,
            };
            for doc in documents {
                edit.update_document(doc)?;
            }
            maybe_crash(points::REBUILD_BEFORE_COMMIT);
            Ok(removed)
        })?;

        if owner.is_none() && self.repair_pending.swap(false, Ordering::SeqCst) {
            info!("full rebuild complete, index repaired");
        }
        self.metrics.increment_rebuilds();
        info!(
            owner = scope,
            removed,
            indexed,
            skipped = entries.len() - indexed,
            "index rebuild complete"
        );
        Ok(())
    }

    fn remove_owner(&self, op: &IndexOperation, owner: &str) -> SearchResult<()> {
        let removed = self.mutate(op, |edit| edit.delete_owner(owner))?;
        info!(owner, removed, "owner documents removed");
        Ok(())
    }

    /// Replace the durable index with the RAM overlay
    fn flush(&self) -> SearchResult<()> {
        if !self.uses_ram() {
            debug!("not in RAM mode, flush skipped");
            return Ok(());
        }
        let ram = self.current_index().map_err(|e| {
            SearchError::operation_failed("RAM overlay unavailable for flush", e)
        })?;
        self.set_marker()?;

        // Readers keep going; mutations are already excluded by the scheduler
        let flushed = {
            let _read = self.read_guard();
            self.write_durable_copy(ram.as_ref())
        };

        match flushed {
            Ok(documents) => {
                self.mutations_since_flush.store(0, Ordering::SeqCst);
                self.clear_marker_if_repaired()?;
                self.metrics.increment_flushes();
                info!(
                    event = %Event::FlushComplete,
                    documents,
                    location = %self.backend.location(),
                    "RAM index flushed to storage"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    event = %Event::FlushFailed,
                    error = %e,
                    "flush failed, purging durable index"
                );
                if let Err(purge) = self.backend.open_directory(true) {
                    error!(error = %purge, "failed to purge durable index after flush failure");
                }
                Err(e)
            }
        }
    }

    fn write_durable_copy(&self, ram: &SearchIndex) -> SearchResult<usize> {
        let documents = ram
            .reader()
            .and_then(|reader| reader.all_documents())
            .map_err(|e| SearchError::operation_failed("Failed to read RAM index", e))?;
        let count = documents.len();

        let dir = self.backend.open_directory(true).map_err(|e| {
            SearchError::operation_storage_failed("Failed to purge durable index for flush", e)
        })?;
        let durable = SearchIndex::create(dir, self.analyzer)
            .map_err(|e| SearchError::operation_failed("Failed to create durable index", e))?;
        durable
            .edit(|edit| {
                for doc in documents {
                    edit.add_document(doc)?;
                }
                maybe_crash(points::FLUSH_BEFORE_COMMIT);
                Ok(())
            })
            .map_err(|e| SearchError::operation_failed("Failed to commit durable index", e))?;
        maybe_crash(points::FLUSH_AFTER_COMMIT);
        durable.close();
        Ok(count)
    }

    /// Marker bookkeeping after a successful document mutation
    fn after_mutation(&self) -> SearchResult<()> {
        if !self.uses_ram() {
            return self.clear_marker_if_repaired();
        }
        let count = self.mutations_since_flush.fetch_add(1, Ordering::SeqCst) + 1;
        match self.config.flush_after_mutations {
            Some(limit) if count >= limit => {
                debug!(mutations = count, "mutation threshold reached, flushing");
                if let Err(e) = self.flush() {
                    // The mutation itself succeeded; the next flush retries
                    warn!(error = %e, "periodic flush failed");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Release the cached reader and close the authoritative index
    pub(crate) fn release(&self) {
        self.invalidate_reader();
        let taken = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(index) = taken {
            match Arc::try_unwrap(index) {
                Ok(index) => index.close(),
                Err(_) => debug!("index still referenced, writer closes on last drop"),
            }
        }
    }
}

impl OperationExecutor for IndexCore {
    fn execute(&self, op: &IndexOperation) -> SearchResult<()> {
        let result = match op {
            IndexOperation::AddEntry(entry) => self.add_entry(op, entry),
            IndexOperation::ReindexEntry(entry) => self.reindex_entry(op, entry),
            IndexOperation::RemoveEntry(entry) => self.remove_entry(op, entry),
            IndexOperation::RebuildOwnerIndex(owner) => self.rebuild(op, owner.as_deref()),
            IndexOperation::RemoveOwnerIndex(owner) => self.remove_owner(op, owner),
            IndexOperation::FlushRamToStorage => return self.flush(),
        };

        match result {
            Ok(()) => self.after_mutation(),
            Err(e) => {
                self.repair_pending.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}
