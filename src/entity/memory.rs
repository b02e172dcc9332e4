//! In-memory entity store

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{EntityError, EntityResult, EntityStore, WeblogEntry};

/// Entity store held in memory, keyed by entry id
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    entries: RwLock<BTreeMap<String, WeblogEntry>>,
}

impl MemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entries`
    pub fn with_entries(entries: impl IntoIterator<Item = WeblogEntry>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.entries.write() {
            for entry in entries {
                map.insert(entry.id.clone(), entry);
            }
        }
        store
    }

    /// Insert or replace an entry
    pub fn upsert(&self, entry: WeblogEntry) -> EntityResult<()> {
        self.entries
            .write()
            .map_err(|_| EntityError::Unavailable("entity store lock poisoned".into()))?
            .insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Remove an entry; returns it if present
    pub fn remove(&self, entry_id: &str) -> EntityResult<Option<WeblogEntry>> {
        Ok(self
            .entries
            .write()
            .map_err(|_| EntityError::Unavailable("entity store lock poisoned".into()))?
            .remove(entry_id))
    }

    /// Remove every entry of `owner`
    pub fn remove_owner(&self, owner: &str) -> EntityResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| EntityError::Unavailable("entity store lock poisoned".into()))?;
        let before = entries.len();
        entries.retain(|_, e| e.owner != owner);
        Ok(before - entries.len())
    }
}

impl EntityStore for MemoryEntityStore {
    fn entries_for_owner(&self, owner: Option<&str>) -> EntityResult<Vec<WeblogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| EntityError::Unavailable("entity store lock poisoned".into()))?;
        Ok(entries
            .values()
            .filter(|e| owner.map_or(true, |o| e.owner == o))
            .cloned()
            .collect())
    }

    fn fetch_entry(&self, entry_id: &str) -> EntityResult<Option<WeblogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| EntityError::Unavailable("entity store lock poisoned".into()))?;
        Ok(entries.get(entry_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_filter() {
        let store = MemoryEntityStore::with_entries([
            WeblogEntry::published("e1", "a", "one", ""),
            WeblogEntry::published("e2", "b", "two", ""),
            WeblogEntry::published("e3", "a", "three", ""),
        ]);

        assert_eq!(store.entries_for_owner(Some("a")).unwrap().len(), 2);
        assert_eq!(store.entries_for_owner(None).unwrap().len(), 3);
        assert_eq!(store.remove_owner("a").unwrap(), 2);
        assert_eq!(store.entries_for_owner(None).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces() {
        let store = MemoryEntityStore::new();
        store.upsert(WeblogEntry::published("e1", "a", "v1", "")).unwrap();
        store.upsert(WeblogEntry::published("e1", "a", "v2", "")).unwrap();

        assert_eq!(store.fetch_entry("e1").unwrap().unwrap().title, "v2");
        assert!(store.remove("e1").unwrap().is_some());
        assert!(store.fetch_entry("e1").unwrap().is_none());
    }
}
