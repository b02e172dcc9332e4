//! # Index Lifecycle Manager
//!
//! Public face of the search subsystem. Owns startup recovery, routes
//! content-change operations to the scheduler, serves the shared reader and
//! runs the shutdown sequence.
//!
//! ```ignore
//! let manager = IndexLifecycleManager::new(config, entities)?;
//! manager.initialize()?;
//! manager.submit_add(entry.entry_ref())?;
//! let hits = manager.get_shared_reader()?.search("rust")?;
//! manager.shutdown()?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::backend::{self, StorageBackend};
use crate::config::SearchConfig;
use crate::engine::IndexReader;
use crate::entity::{EntityStore, EntryRef};
use crate::marker::ConsistencyMarker;
use crate::observability::{Event, MetricsRegistry, MetricsSnapshot};
use crate::scheduler::{
    InlineTaskRunner, OperationExecutor, OperationScheduler, TaskRunner, ThreadTaskRunner,
};

use super::core::{IndexCore, Recovery};
use super::errors::{SearchError, SearchResult};
use super::operation::IndexOperation;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// `initialize` has not completed
    Uninitialized,
    /// Startup found the index untrustworthy and scheduled a rebuild
    InconsistentAtStartup,
    /// Startup found a trustworthy index
    Consistent,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexState::Uninitialized => write!(f, "UNINITIALIZED"),
            IndexState::InconsistentAtStartup => write!(f, "INCONSISTENT_AT_STARTUP"),
            IndexState::Consistent => write!(f, "CONSISTENT"),
        }
    }
}

/// Search index lifecycle manager
#[derive(Debug)]
pub struct IndexLifecycleManager {
    enabled: bool,
    core: Arc<IndexCore>,
    scheduler: OperationScheduler,
    /// Serializes initialize and shutdown
    lifecycle: Mutex<()>,
    initialized: AtomicBool,
    inconsistent_at_startup: AtomicBool,
    shut_down: AtomicBool,
    metrics: Arc<MetricsRegistry>,
}

impl IndexLifecycleManager {
    /// Build a manager with the configured backend and a background worker.
    ///
    /// Performs no storage I/O.
    pub fn new(config: SearchConfig, entities: Arc<dyn EntityStore>) -> SearchResult<Self> {
        config.validate()?;
        let (backend, marker) = backend::from_config(&config);
        let runner: Arc<dyn TaskRunner> = if config.search_enabled {
            Arc::new(ThreadTaskRunner::new(config.queue_capacity).map_err(|e| {
                SearchError::scheduling_failed(format!("Failed to start index worker: {}", e))
            })?)
        } else {
            Arc::new(InlineTaskRunner)
        };
        Ok(Self::from_parts(config, backend, marker, entities, runner))
    }

    /// Build a manager from explicit parts
    pub fn from_parts(
        config: SearchConfig,
        backend: Arc<dyn StorageBackend>,
        marker: Arc<dyn ConsistencyMarker>,
        entities: Arc<dyn EntityStore>,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        let enabled = config.search_enabled;
        let metrics = Arc::new(MetricsRegistry::new());
        let core = Arc::new(IndexCore::new(
            config,
            backend,
            marker,
            entities,
            Arc::clone(&metrics),
        ));
        let scheduler = OperationScheduler::new(
            enabled,
            Arc::clone(&core) as Arc<dyn OperationExecutor>,
            runner,
            Arc::clone(&metrics),
        );
        Self {
            enabled,
            core,
            scheduler,
            lifecycle: Mutex::new(()),
            initialized: AtomicBool::new(false),
            inconsistent_at_startup: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            metrics,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Recover the index and make it ready for use.
    ///
    /// Idempotent. If the index is found inconsistent a full rebuild is
    /// queued and this returns without waiting for it.
    pub fn initialize(&self) -> SearchResult<()> {
        if !self.enabled {
            info!(event = %Event::SearchDisabled, "search disabled, skipping initialization");
            return Ok(());
        }
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        info!(
            event = %Event::InitStart,
            location = %self.core.backend().location(),
            ram = self.core.uses_ram(),
            "initializing search index"
        );

        match self.core.recover()? {
            Recovery::RebuildRequired => {
                self.inconsistent_at_startup.store(true, Ordering::SeqCst);
                self.initialized.store(true, Ordering::SeqCst);
                warn!(
                    event = %Event::IndexInconsistent,
                    "search index inconsistent, scheduling full rebuild"
                );
                if let Err(e) = self.scheduler.submit_async(IndexOperation::full_rebuild()) {
                    // The core keeps the marker set until a full rebuild
                    // succeeds, so the next startup retries
                    error!(
                        error = %e,
                        repair_pending = self.core.repair_pending(),
                        "failed to schedule startup rebuild"
                    );
                }
            }
            Recovery::Consistent => {
                self.initialized.store(true, Ordering::SeqCst);
                info!(event = %Event::IndexReady, "search index ready");
            }
        }
        Ok(())
    }

    /// Drain pending work and release resources.
    ///
    /// RAM mode runs a final flush; durable mode clears the marker. Later
    /// submissions are refused.
    pub fn shutdown(&self) -> SearchResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(event = %Event::ShutdownStart, "search index shutting down");

        let mut result = Ok(());
        if !self.initialized.load(Ordering::SeqCst) {
            self.scheduler.stop_accepting();
            self.scheduler.wait_idle();
        } else if self.core.uses_ram() {
            // Closes intake first, then runs after everything already queued
            result = self.scheduler.submit_final(IndexOperation::FlushRamToStorage);
            self.scheduler.wait_idle();
        } else {
            self.scheduler.stop_accepting();
            self.scheduler.wait_idle();
            result = self.core.clear_marker_if_repaired();
        }

        self.core.release();
        match &result {
            Ok(()) => info!(event = %Event::ShutdownComplete, "search index shut down"),
            Err(e) => error!(
                event = %Event::ShutdownComplete,
                error = %e,
                "search index shut down with errors"
            ),
        }
        result
    }

    // =========================================================================
    // Submissions
    // =========================================================================

    fn ensure_initialized(&self) -> SearchResult<()> {
        if !self.enabled || self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        Err(SearchError::scheduling_failed(
            "search index not initialized",
        ))
    }

    fn submit(&self, op: IndexOperation) -> SearchResult<()> {
        self.ensure_initialized()?;
        self.scheduler.submit_async(op)
    }

    /// Queue indexing of a new entry
    pub fn submit_add(&self, entry: EntryRef) -> SearchResult<()> {
        self.submit(IndexOperation::AddEntry(entry))
    }

    /// Queue re-indexing of a changed entry
    pub fn submit_reindex(&self, entry: EntryRef) -> SearchResult<()> {
        self.submit(IndexOperation::ReindexEntry(entry))
    }

    /// Remove an entry now; returns once the removal is committed
    pub fn submit_remove(&self, entry: EntryRef) -> SearchResult<()> {
        self.execute_now(IndexOperation::RemoveEntry(entry))
    }

    /// Queue a rebuild of one owner, or of everything when `owner` is `None`
    pub fn submit_rebuild(&self, owner: Option<&str>) -> SearchResult<()> {
        self.submit(IndexOperation::RebuildOwnerIndex(owner.map(str::to_string)))
    }

    /// Queue removal of every document of `owner`
    pub fn submit_remove_owner(&self, owner: &str) -> SearchResult<()> {
        self.submit(IndexOperation::RemoveOwnerIndex(owner.to_string()))
    }

    /// Queue a flush of the RAM overlay (no-op outside RAM mode)
    pub fn submit_flush(&self) -> SearchResult<()> {
        self.submit(IndexOperation::FlushRamToStorage)
    }

    /// Run `op` on this thread after all earlier submissions
    pub fn execute_now(&self, op: IndexOperation) -> SearchResult<()> {
        self.ensure_initialized()?;
        self.scheduler.submit_sync(op)
    }

    /// Block until every accepted operation has finished
    pub fn wait_for_pending(&self) {
        self.scheduler.wait_idle();
    }

    /// Operations accepted but not yet finished
    pub fn pending_operations(&self) -> u64 {
        self.scheduler.pending()
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Shared reader over the current index, reused until the next mutation
    pub fn get_shared_reader(&self) -> SearchResult<Arc<IndexReader>> {
        if !self.enabled {
            return Err(SearchError::reader_refused("search disabled"));
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(SearchError::reader_refused("search index not initialized"));
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SearchError::reader_refused("search index shut down"));
        }
        self.core.shared_reader()
    }

    /// Drop the cached reader
    pub fn invalidate_reader(&self) {
        self.core.invalidate_reader();
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether startup found the index inconsistent. Sticky for the process.
    pub fn is_inconsistent_at_startup(&self) -> bool {
        self.inconsistent_at_startup.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> IndexState {
        if !self.initialized.load(Ordering::SeqCst) {
            IndexState::Uninitialized
        } else if self.is_inconsistent_at_startup() {
            IndexState::InconsistentAtStartup
        } else {
            IndexState::Consistent
        }
    }

    /// Where durable index files live
    pub fn location(&self) -> String {
        self.core.backend().location()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{MemoryEntityStore, WeblogEntry};
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> (IndexLifecycleManager, Arc<MemoryEntityStore>) {
        let entities = Arc::new(MemoryEntityStore::new());
        let manager = IndexLifecycleManager::new(
            SearchConfig::with_location(temp.path()),
            Arc::clone(&entities) as Arc<dyn EntityStore>,
        )
        .unwrap();
        (manager, entities)
    }

    #[test]
    fn test_state_transitions() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = manager(&temp);
        assert_eq!(manager.state(), IndexState::Uninitialized);

        manager.initialize().unwrap();
        manager.wait_for_pending();
        assert_eq!(manager.state(), IndexState::InconsistentAtStartup);
        assert!(manager.is_inconsistent_at_startup());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = manager(&temp);
        manager.initialize().unwrap();
        manager.initialize().unwrap();
        manager.wait_for_pending();
        assert_eq!(manager.metrics().rebuilds, 1);
    }

    #[test]
    fn test_submit_before_initialize_refused() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = manager(&temp);
        assert!(manager.submit_add(EntryRef::new("e1", "blog")).is_err());
        assert!(manager.get_shared_reader().is_err());
    }

    #[test]
    fn test_search_after_add() {
        let temp = TempDir::new().unwrap();
        let (manager, entities) = manager(&temp);
        manager.initialize().unwrap();
        let entry = WeblogEntry::published("e1", "blog", "Rust ownership", "borrowing rules");
        entities.upsert(entry.clone()).unwrap();

        manager.submit_add(entry.entry_ref()).unwrap();
        manager.wait_for_pending();

        let reader = manager.get_shared_reader().unwrap();
        let hits = reader.search("ownership").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry_id, "e1");
    }

    #[test]
    fn test_shutdown_refuses_further_work() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = manager(&temp);
        manager.initialize().unwrap();
        manager.shutdown().unwrap();
        manager.shutdown().unwrap();

        assert!(manager.submit_rebuild(None).is_err());
        assert!(manager.get_shared_reader().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(IndexState::Consistent.to_string(), "CONSISTENT");
        assert_eq!(
            IndexState::InconsistentAtStartup.to_string(),
            "INCONSISTENT_AT_STARTUP"
        );
    }
}
