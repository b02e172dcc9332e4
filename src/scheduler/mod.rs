//! # Operation Scheduler
//!
//! Hands index operations to a [`TaskRunner`] and serializes their execution
//! through a [`MutationSlot`].
//!
//! - Asynchronous submissions run on the runner's background worker, FIFO
//! - Synchronous submissions run on the caller's thread, after every earlier
//!   submission and never alongside one
//! - A rejected submission is logged, counted and dropped; it never blocks
//!   later operations
//! - Disabled: every submission is a no-op

mod errors;
mod runner;
mod slot;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, warn};

pub use errors::{RunnerError, RunnerResult};
pub use runner::{InlineTaskRunner, Task, TaskRunner, ThreadTaskRunner};
pub use slot::{MutationSlot, SlotGuard, Ticket};

use crate::observability::{Event, MetricsRegistry};
use crate::search::{IndexOperation, SearchError, SearchResult};

/// Executes one operation against the index
pub trait OperationExecutor: Send + Sync + fmt::Debug {
    fn execute(&self, op: &IndexOperation) -> SearchResult<()>;
}

/// Serializing front end over a task runner
#[derive(Debug)]
pub struct OperationScheduler {
    enabled: bool,
    executor: Arc<dyn OperationExecutor>,
    runner: Arc<dyn TaskRunner>,
    slot: Arc<MutationSlot>,
    /// Makes "take ticket, hand task to runner" atomic so queue order matches
    /// ticket order
    submit_lock: Mutex<()>,
    accepting: AtomicBool,
    metrics: Arc<MetricsRegistry>,
}

impl OperationScheduler {
    pub fn new(
        enabled: bool,
        executor: Arc<dyn OperationExecutor>,
        runner: Arc<dyn TaskRunner>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            enabled,
            executor,
            runner,
            slot: Arc::new(MutationSlot::new()),
            submit_lock: Mutex::new(()),
            accepting: AtomicBool::new(true),
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether submissions are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Refuse every later submission. Accepted work still runs.
    pub fn stop_accepting(&self) {
        let _order = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Queue `op` on the background worker.
    ///
    /// Returns a `SchedulingFailure` if the runner refused it; the operation
    /// is then dropped.
    pub fn submit_async(&self, op: IndexOperation) -> SearchResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let result = {
            let _order = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.check_accepting(&op)?;
            self.metrics.increment_operations_submitted();
            let ticket = self.slot.take_ticket();
            let executor = Arc::clone(&self.executor);
            let metrics = Arc::clone(&self.metrics);
            let task_op = op.clone();
            self.runner.run_in_background(Box::new(move || {
                let _guard = ticket.acquire();
                let _ = run_operation(executor.as_ref(), &metrics, &task_op);
            }))
        };

        match result {
            Ok(()) => {
                self.metrics.increment_tasks_scheduled();
                debug!(event = %Event::OperationScheduled, operation = %op, "operation scheduled");
                Ok(())
            }
            Err(e) => Err(self.dropped(&op, e)),
        }
    }

    /// Run `op` on the calling thread once every earlier submission is done
    pub fn submit_sync(&self, op: IndexOperation) -> SearchResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let ticket = {
            let _order = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.check_accepting(&op)?;
            self.metrics.increment_operations_submitted();
            self.slot.take_ticket()
        };
        self.run_ticket_sync(op, ticket)
    }

    /// Stop accepting and run `op` as the last operation, on the calling
    /// thread.
    ///
    /// Every submission accepted before this call runs first; every later one
    /// is refused.
    pub fn submit_final(&self, op: IndexOperation) -> SearchResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let ticket = {
            let _order = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.accepting.store(false, Ordering::SeqCst);
            self.metrics.increment_operations_submitted();
            self.slot.take_ticket()
        };
        self.run_ticket_sync(op, ticket)
    }

    fn run_ticket_sync(&self, op: IndexOperation, ticket: Ticket) -> SearchResult<()> {
        let (tx, rx) = channel();
        let executor = Arc::clone(&self.executor);
        let metrics = Arc::clone(&self.metrics);
        let task_op = op.clone();
        let task: Task = Box::new(move || {
            let _guard = ticket.acquire();
            let _ = tx.send(run_operation(executor.as_ref(), &metrics, &task_op));
        });

        if let Err(e) = self.runner.run_in_foreground(task) {
            return Err(self.dropped(&op, e));
        }
        match rx.recv() {
            Ok(result) => result,
            Err(_) => Err(self.dropped(&op, RunnerError::Stopped)),
        }
    }

    /// Block until every accepted operation has finished.
    ///
    /// Must not be called from inside an operation.
    pub fn wait_idle(&self) {
        self.slot.wait_idle();
    }

    /// Operations accepted but not yet finished
    pub fn pending(&self) -> u64 {
        self.slot.outstanding()
    }

    fn check_accepting(&self, op: &IndexOperation) -> SearchResult<()> {
        if self.is_accepting() {
            return Ok(());
        }
        warn!(event = %Event::OperationDropped, operation = %op, "scheduler stopped, operation refused");
        Err(SearchError::scheduling_failed(format!(
            "scheduler stopped, {} refused",
            op
        )))
    }

    fn dropped(&self, op: &IndexOperation, cause: RunnerError) -> SearchError {
        self.metrics.increment_scheduling_failures();
        error!(
            event = %Event::OperationDropped,
            operation = %op,
            error = %cause,
            "task runner rejected operation, dropping it"
        );
        SearchError::scheduling_failed(format!("{} dropped: {}", op, cause))
    }
}

fn run_operation(
    executor: &dyn OperationExecutor,
    metrics: &MetricsRegistry,
    op: &IndexOperation,
) -> SearchResult<()> {
    match executor.execute(op) {
        Ok(()) => {
            metrics.increment_operations_executed();
            debug!(event = %Event::OperationComplete, operation = %op, "operation complete");
            Ok(())
        }
        Err(e) => {
            metrics.increment_operations_failed();
            error!(
                event = %Event::OperationFailed,
                operation = %op,
                code = e.code().as_str(),
                error = %e,
                "operation failed"
            );
            Err(e)
        }
    }
}
