//! Entity store reading a JSON array of entries from a file.
//!
//! The file is re-read on every call so rebuilds see its current content.

use std::fs;
use std::path::{Path, PathBuf};

use super::{EntityError, EntityResult, EntityStore, WeblogEntry};

/// Entity store backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonEntityStore {
    path: PathBuf,
}

impl JsonEntityStore {
    /// Store reading `path`; no I/O is performed
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Source file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> EntityResult<Vec<WeblogEntry>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            EntityError::Unavailable(format!("read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| EntityError::Malformed(format!("{}: {}", self.path.display(), e)))
    }
}

impl EntityStore for JsonEntityStore {
    fn entries_for_owner(&self, owner: Option<&str>) -> EntityResult<Vec<WeblogEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| owner.map_or(true, |o| e.owner == o))
            .collect())
    }

    fn fetch_entry(&self, entry_id: &str) -> EntityResult<Option<WeblogEntry>> {
        Ok(self.load()?.into_iter().find(|e| e.id == entry_id))
    }
}
