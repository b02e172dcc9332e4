//! Consistency marker
//!
//! A durable flag meaning "the durable index may not match the entity store".
//! It is stored beside the segments, never among them, so a crash can leave
//! the two disagreeing: that disagreement is what startup recovery reads.
//!
//! # Invariants
//!
//! - SET from the moment a mutation begins until it durably completes
//! - ABSENT implies the durable index is trustworthy
//! - Clearing an absent marker is not an error

mod collection;
mod file;

use std::fmt;

pub use collection::CollectionMarker;
pub use file::{FileMarker, MarkerRecord, MARKER_FILE};

use crate::backend::BackendResult;

/// Durable "index unverified" flag
pub trait ConsistencyMarker: Send + Sync + fmt::Debug {
    /// Whether the marker is currently set
    fn is_set(&self) -> BackendResult<bool>;

    /// Durably set the marker
    fn set(&self) -> BackendResult<()>;

    /// Durably clear the marker
    fn clear(&self) -> BackendResult<()>;
}
