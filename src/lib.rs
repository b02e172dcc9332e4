//! weblog-search - Crash-safe full-text index lifecycle for weblog entries
//!
//! The index is a derived cache of the entity store. This crate keeps it
//! consistent across crashes and restarts: a durable consistency marker,
//! purge-and-rebuild recovery, serialized mutations and an optional RAM
//! overlay flushed to durable storage.

pub mod backend;
pub mod cli;
pub mod config;
pub mod crash_point;
pub mod engine;
pub mod entity;
pub mod marker;
pub mod observability;
pub mod scheduler;
pub mod search;

pub use config::{BackendKind, SearchConfig};
pub use search::{
    IndexLifecycleManager, IndexOperation, IndexState, SearchError, SearchErrorCode, SearchResult,
};
