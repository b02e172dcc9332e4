//! Index engine for weblog-search
//!
//! A thin layer over tantivy. The lifecycle layer treats the on-disk format
//! as opaque; it only opens, edits and reads indexes in a directory handed
//! out by a storage backend.
//!
//! # Invariants
//!
//! - One [`SearchIndex`] (one writer) per directory at a time
//! - An edit is published by exactly one commit, or not at all
//! - Readers are immutable snapshots of one commit

mod analyzer;
mod document;
mod errors;
mod index;
mod reader;
mod schema;

pub use analyzer::{Analyzer, TokenLimit, ANALYZER_NAME, DEFAULT_MAX_FIELD_TOKENS};
pub use document::IndexDocument;
pub use errors::{IndexError, IndexResult};
pub use index::{IndexEdit, SearchIndex};
pub use reader::{index_exists, IndexReader};
pub use schema::index_schema;

/// Directory abstraction the engine stores its files in
pub use tantivy::directory::Directory;
