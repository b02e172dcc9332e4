//! Metrics registry for the search subsystem
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; exactness across threads is not required

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Operations handed to the scheduler
    operations_submitted: AtomicU64,
    /// Operations that completed successfully
    operations_executed: AtomicU64,
    /// Operations that ran and failed
    operations_failed: AtomicU64,
    /// Operations dropped because the runner rejected them
    scheduling_failures: AtomicU64,
    /// Tasks handed to the background runner
    tasks_scheduled: AtomicU64,
    /// Shared readers opened
    readers_opened: AtomicU64,
    /// Successful RAM flushes
    flushes: AtomicU64,
    /// Successful rebuilds (owner or full)
    rebuilds: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub operations_submitted: u64,
    pub operations_executed: u64,
    pub operations_failed: u64,
    pub scheduling_failures: u64,
    pub tasks_scheduled: u64,
    pub readers_opened: u64,
    pub flushes: u64,
    pub rebuilds: u64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_operations_submitted(&self) {
        self.operations_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_operations_executed(&self) {
        self.operations_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_operations_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scheduling_failures(&self) {
        self.scheduling_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_scheduled(&self) {
        self.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_readers_opened(&self) {
        self.readers_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_flushes(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rebuilds(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations_submitted: self.operations_submitted.load(Ordering::Relaxed),
            operations_executed: self.operations_executed.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
            scheduling_failures: self.scheduling_failures.load(Ordering::Relaxed),
            tasks_scheduled: self.tasks_scheduled.load(Ordering::Relaxed),
            readers_opened: self.readers_opened.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
        }
    }
}
