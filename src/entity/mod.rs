//! # Entity Store Interface
//!
//! The search subsystem does not own weblog content. It reads entries through
//! [`EntityStore`] when (re)building documents and never writes back.

mod json;
mod memory;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::IndexDocument;

pub use json::JsonEntityStore;
pub use memory::MemoryEntityStore;

/// Result type for entity store reads
pub type EntityResult<T> = Result<T, EntityError>;

/// Entity store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityError {
    #[error("Entity store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed entity data: {0}")]
    Malformed(String),
}

/// A weblog entry as supplied by the content layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeblogEntry {
    /// Entry identity
    pub id: String,
    /// Owning weblog handle
    pub owner: String,
    /// Title
    pub title: String,
    /// Body text
    #[serde(default)]
    pub text: String,
    /// Summary
    #[serde(default)]
    pub summary: String,
    /// Author user name
    #[serde(default)]
    pub author: String,
    /// Category names
    #[serde(default)]
    pub categories: Vec<String>,
    /// Tag names
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the entry is published
    #[serde(default)]
    pub published: bool,
    /// Publication time
    #[serde(default)]
    pub pub_time: Option<DateTime<Utc>>,
}

impl WeblogEntry {
    /// A published entry with empty optional fields
    pub fn published(
        id: impl Into<String>,
        owner: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            title: title.into(),
            text: text.into(),
            summary: String::new(),
            author: String::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            published: true,
            pub_time: Some(Utc::now()),
        }
    }

    /// Identity handle used by index operations
    pub fn entry_ref(&self) -> EntryRef {
        EntryRef::new(&self.id, &self.owner)
    }

    /// Indexed projection, or `None` for entries that must not be searchable
    pub fn to_document(&self) -> Option<IndexDocument> {
        if !self.published {
            return None;
        }
        Some(IndexDocument {
            entry_id: self.id.clone(),
            owner: self.owner.clone(),
            title: self.title.clone(),
            text: self.text.clone(),
            summary: self.summary.clone(),
            author: self.author.clone(),
            categories: self.categories.clone(),
            tags: self.tags.clone(),
            published_at: self.pub_time,
        })
    }
}

/// Identity of an entry: id plus owning weblog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    /// Entry identity
    pub entry_id: String,
    /// Owning weblog handle
    pub owner: String,
}

impl EntryRef {
    /// Create an entry reference
    pub fn new(entry_id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.entry_id)
    }
}

/// Read access to weblog entries
pub trait EntityStore: Send + Sync + fmt::Debug {
    /// All entries of `owner`, or of every owner when `None`
    fn entries_for_owner(&self, owner: Option<&str>) -> EntityResult<Vec<WeblogEntry>>;

    /// Current version of one entry
    fn fetch_entry(&self, entry_id: &str) -> EntityResult<Option<WeblogEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublished_entry_has_no_document() {
        let mut entry = WeblogEntry::published("e1", "blog", "Draft", "wip");
        entry.published = false;
        assert!(entry.to_document().is_none());
    }

    #[test]
    fn test_document_projection() {
        let mut entry = WeblogEntry::published("e1", "blog", "Title", "Body");
        entry.tags = vec!["rust".into()];
        let doc = entry.to_document().unwrap();

        assert_eq!(doc.entry_id, "e1");
        assert_eq!(doc.owner, "blog");
        assert_eq!(doc.tags, vec!["rust"]);
        assert_eq!(doc.published_at, entry.pub_time);
    }

    #[test]
    fn test_entry_ref_display() {
        let entry = WeblogEntry::published("e7", "travel", "t", "x");
        assert_eq!(entry.entry_ref().to_string(), "travel/e7");
    }
}
