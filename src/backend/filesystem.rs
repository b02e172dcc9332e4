//! # Local Filesystem Backend
//!
//! Index files live under `<root>/index/`, served to the engine through a
//! memory-mapped tantivy directory.
//!
//! Purging detaches the whole segment directory with a single rename before
//! deleting anything, so an interrupted purge leaves either the old directory
//! or no directory at all. Detached leftovers are swept on the next
//! create or purge.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tantivy::directory::MmapDirectory;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::crash_point::{maybe_crash, points};
use crate::engine::Directory;

use super::errors::{BackendError, BackendResult};
use super::StorageBackend;

const INDEX_DIR: &str = "index";
const PURGING_INFIX: &str = ".purging-";

/// Fsync a directory so renames and unlinks inside it are durable
pub(crate) fn sync_dir(path: &Path) -> std::io::Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()
}

/// Storage backend keeping segments in a local directory
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`; no I/O is performed
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding the segment directory and marker
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the segment directory
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    /// Remove detached directories left by an interrupted purge
    fn sweep_detached(&self) -> BackendResult<()> {
        if !self.root.is_dir() {
            return Ok(());
        }
        let prefix = format!("{}{}", INDEX_DIR, PURGING_INFIX);
        let entries = fs::read_dir(&self.root)
            .map_err(|e| BackendError::io(format!("list {}", self.root.display()), e))?;
        for entry in entries.flatten() {
            let is_detached = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(&prefix));
            if is_detached {
                debug!(path = %entry.path().display(), "sweeping detached index directory");
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    warn!(path = %entry.path().display(), error = %e, "could not sweep detached index directory");
                }
            }
        }
        Ok(())
    }

    fn purge(&self) -> BackendResult<()> {
        self.sweep_detached()?;
        let index = self.index_path();

        if index.exists() {
            let detached = self
                .root
                .join(format!("{}{}{}", INDEX_DIR, PURGING_INFIX, Uuid::new_v4()));
            fs::rename(&index, &detached)
                .map_err(|e| BackendError::io(format!("detach {}", index.display()), e))?;
            sync_dir(&self.root)
                .map_err(|e| BackendError::io(format!("fsync {}", self.root.display()), e))?;

            maybe_crash(points::PURGE_AFTER_DETACH);

            fs::create_dir_all(&index)
                .map_err(|e| BackendError::io(format!("create {}", index.display()), e))?;
            fs::remove_dir_all(&detached)
                .map_err(|e| BackendError::io(format!("remove {}", detached.display()), e))?;
        } else {
            fs::create_dir_all(&index)
                .map_err(|e| BackendError::io(format!("create {}", index.display()), e))?;
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn open_directory(&self, purge: bool) -> BackendResult<Box<dyn Directory>> {
        if purge {
            self.purge()?;
        }
        let index = self.index_path();
        let dir = MmapDirectory::open(&index).map_err(|e| {
            BackendError::Io(format!("open {}: {}", index.display(), e))
        })?;
        Ok(Box::new(dir))
    }

    fn exists(&self) -> BackendResult<bool> {
        Ok(self.index_path().is_dir())
    }

    fn create(&self) -> BackendResult<()> {
        let index = self.index_path();
        fs::create_dir_all(&index)
            .map_err(|e| BackendError::io(format!("create {}", index.display()), e))?;
        self.sweep_detached()
    }

    fn location(&self) -> String {
        self.index_path().display().to_string()
    }
}
