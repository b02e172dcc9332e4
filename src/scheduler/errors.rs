//! Task runner errors

use thiserror::Error;

/// Result type for task runner calls
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Why a runner refused a task
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Task queue full (capacity {0})")]
    QueueFull(usize),

    #[error("Task runner stopped")]
    Stopped,

    #[error("Failed to start worker: {0}")]
    Spawn(String),
}
