//! Task runners
//!
//! The host decides where index work runs. [`ThreadTaskRunner`] is the
//! default: one named worker thread draining a bounded queue, so background
//! tasks execute one at a time in submission order.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::errors::{RunnerError, RunnerResult};

/// A unit of work handed to a runner
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where scheduled work executes
pub trait TaskRunner: Send + Sync + fmt::Debug {
    /// Queue `task` for execution on a background thread.
    ///
    /// Tasks accepted by one runner must execute in acceptance order.
    fn run_in_background(&self, task: Task) -> RunnerResult<()>;

    /// Execute `task` on the calling thread before returning
    fn run_in_foreground(&self, task: Task) -> RunnerResult<()>;
}

const WORKER_NAME: &str = "weblog-search-indexer";

/// Single worker thread over a bounded queue
pub struct ThreadTaskRunner {
    capacity: usize,
    sender: Mutex<Option<SyncSender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTaskRunner {
    /// Start the worker with room for `capacity` queued tasks
    pub fn new(capacity: usize) -> RunnerResult<Self> {
        let (sender, receiver) = sync_channel::<Task>(capacity);
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                for task in receiver {
                    // A panicking task must not take the worker down with it
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(worker = WORKER_NAME, "background task panicked");
                    }
                }
                debug!(worker = WORKER_NAME, "task queue closed, worker exiting");
            })
            .map_err(|e| RunnerError::Spawn(e.to_string()))?;

        Ok(Self {
            capacity,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the queue, let the worker finish queued tasks, and join it.
    ///
    /// Must not be called from a task running on this runner.
    pub fn stop(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!(worker = WORKER_NAME, "worker thread panicked");
            }
        }
    }
}

impl TaskRunner for ThreadTaskRunner {
    fn run_in_background(&self, task: Task) -> RunnerResult<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(RunnerError::Stopped)?;
        sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => RunnerError::QueueFull(self.capacity),
            TrySendError::Disconnected(_) => RunnerError::Stopped,
        })
    }

    fn run_in_foreground(&self, task: Task) -> RunnerResult<()> {
        task();
        Ok(())
    }
}

/// Runs every task on the submitting thread.
///
/// For single-shot tools where a background worker buys nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineTaskRunner;

impl TaskRunner for InlineTaskRunner {
    fn run_in_background(&self, task: Task) -> RunnerResult<()> {
        task();
        Ok(())
    }

    fn run_in_foreground(&self, task: Task) -> RunnerResult<()> {
        task();
        Ok(())
    }
}

impl fmt::Debug for ThreadTaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadTaskRunner")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Drop for ThreadTaskRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
