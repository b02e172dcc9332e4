//! # Search Index Lifecycle
//!
//! Keeps the weblog full-text index consistent with the entity store across
//! crashes and restarts.
//!
//! - Startup recovery driven by the consistency marker
//! - Serialized mutations through the operation scheduler
//! - Optional RAM overlay flushed to durable storage
//! - Cached shared reader invalidated after every mutation

mod core;
mod errors;
mod manager;
mod operation;

pub use errors::{SearchError, SearchErrorCode, SearchResult, Severity};
pub use manager::{IndexLifecycleManager, IndexState};
pub use operation::{IndexOperation, OperationKind};
