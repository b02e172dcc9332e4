//! Index operations
//!
//! An operation is an immutable unit of index work, created by content hooks
//! (entry save/delete, weblog delete) and consumed exactly once by the
//! scheduler.

use std::fmt;

use crate::entity::EntryRef;

/// Operation kind, for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AddEntry,
    ReindexEntry,
    RemoveEntry,
    RebuildOwnerIndex,
    RemoveOwnerIndex,
    FlushRamToStorage,
}

impl OperationKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AddEntry => "ADD_ENTRY",
            OperationKind::ReindexEntry => "REINDEX_ENTRY",
            OperationKind::RemoveEntry => "REMOVE_ENTRY",
            OperationKind::RebuildOwnerIndex => "REBUILD_OWNER_INDEX",
            OperationKind::RemoveOwnerIndex => "REMOVE_OWNER_INDEX",
            OperationKind::FlushRamToStorage => "FLUSH_RAM_TO_STORAGE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of index mutation work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOperation {
    /// Insert one entry; fails if it is already indexed
    AddEntry(EntryRef),
    /// Replace one entry with its current version
    ReindexEntry(EntryRef),
    /// Delete one entry if present
    RemoveEntry(EntryRef),
    /// Re-derive all documents of an owner, or of every owner when `None`
    RebuildOwnerIndex(Option<String>),
    /// Delete all documents of an owner
    RemoveOwnerIndex(String),
    /// Copy the RAM overlay into durable storage
    FlushRamToStorage,
}

impl IndexOperation {
    /// Full rebuild of every owner
    pub fn full_rebuild() -> Self {
        IndexOperation::RebuildOwnerIndex(None)
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            IndexOperation::AddEntry(_) => OperationKind::AddEntry,
            IndexOperation::ReindexEntry(_) => OperationKind::ReindexEntry,
            IndexOperation::RemoveEntry(_) => OperationKind::RemoveEntry,
            IndexOperation::RebuildOwnerIndex(_) => OperationKind::RebuildOwnerIndex,
            IndexOperation::RemoveOwnerIndex(_) => OperationKind::RemoveOwnerIndex,
            IndexOperation::FlushRamToStorage => OperationKind::FlushRamToStorage,
        }
    }

    /// Entry targeted by this operation, if any
    pub fn entry(&self) -> Option<&EntryRef> {
        match self {
            IndexOperation::AddEntry(e)
            | IndexOperation::ReindexEntry(e)
            | IndexOperation::RemoveEntry(e) => Some(e),
            _ => None,
        }
    }

    /// Owner scoped by this operation. `None` for a full rebuild and flush.
    pub fn owner(&self) -> Option<&str> {
        match self {
            IndexOperation::AddEntry(e)
            | IndexOperation::ReindexEntry(e)
            | IndexOperation::RemoveEntry(e) => Some(&e.owner),
            IndexOperation::RebuildOwnerIndex(owner) => owner.as_deref(),
            IndexOperation::RemoveOwnerIndex(owner) => Some(owner),
            IndexOperation::FlushRamToStorage => None,
        }
    }

    /// Whether this operation changes document content
    pub fn changes_documents(&self) -> bool {
        !matches!(self, IndexOperation::FlushRamToStorage)
    }
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOperation::AddEntry(e)
            | IndexOperation::ReindexEntry(e)
            | IndexOperation::RemoveEntry(e) => write!(f, "{}({})", self.kind(), e),
            IndexOperation::RebuildOwnerIndex(Some(owner))
            | IndexOperation::RemoveOwnerIndex(owner) => write!(f, "{}({})", self.kind(), owner),
            IndexOperation::RebuildOwnerIndex(None) => write!(f, "{}(*)", self.kind()),
            IndexOperation::FlushRamToStorage => write!(f, "{}", self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let op = IndexOperation::ReindexEntry(EntryRef::new("e1", "blog"));
        assert_eq!(op.kind(), OperationKind::ReindexEntry);
        assert_eq!(op.owner(), Some("blog"));
        assert_eq!(op.entry().unwrap().entry_id, "e1");
        assert!(op.changes_documents());

        assert_eq!(IndexOperation::full_rebuild().owner(), None);
        assert!(IndexOperation::FlushRamToStorage.entry().is_none());
        assert!(!IndexOperation::FlushRamToStorage.changes_documents());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            IndexOperation::RemoveEntry(EntryRef::new("e1", "blog")).to_string(),
            "REMOVE_ENTRY(blog/e1)"
        );
        assert_eq!(
            IndexOperation::full_rebuild().to_string(),
            "REBUILD_OWNER_INDEX(*)"
        );
        assert_eq!(
            IndexOperation::RemoveOwnerIndex("blog".into()).to_string(),
            "REMOVE_OWNER_INDEX(blog)"
        );
    }
}
