//! File-backed consistency marker
//!
//! Location: `<storage_location>/index-inconsistent`, a sibling of the
//! segment directory. The file holds a small JSON record for diagnostics;
//! only its existence carries meaning.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::backend::{sync_dir, BackendError, BackendResult};
use crate::crash_point::{maybe_crash, points};

use super::ConsistencyMarker;

/// Marker file name inside the storage location
pub const MARKER_FILE: &str = "index-inconsistent";

/// Diagnostic content of the marker file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerRecord {
    /// When the marker was set (RFC3339)
    pub set_at: String,
    /// Process that set it
    pub pid: u32,
    /// Format version (always 1)
    pub format_version: u8,
}

impl MarkerRecord {
    /// Record for the current process and time
    pub fn now() -> Self {
        Self {
            set_at: Utc::now().to_rfc3339(),
            pid: std::process::id(),
            format_version: 1,
        }
    }
}

/// Consistency marker stored as a file
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    /// Marker at `path`; no I/O is performed
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the diagnostic record of a set marker
    pub fn read_record(&self) -> BackendResult<Option<MarkerRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(format!("read {}", self.path.display()), e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BackendError::InvalidRecord {
                key: MARKER_FILE.to_string(),
                reason: e.to_string(),
            })
    }
}

impl ConsistencyMarker for FileMarker {
    fn is_set(&self) -> BackendResult<bool> {
        Ok(self.path.exists())
    }

    fn set(&self) -> BackendResult<()> {
        let json = serde_json::to_vec_pretty(&MarkerRecord::now()).map_err(|e| {
            BackendError::InvalidRecord {
                key: MARKER_FILE.to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BackendError::io(format!("create marker directory {}", parent.display()), e)
            })?;
        }

        let mut file = File::create(&self.path)
            .map_err(|e| BackendError::io(format!("create {}", self.path.display()), e))?;
        file.write_all(&json)
            .map_err(|e| BackendError::io(format!("write {}", self.path.display()), e))?;

        // fsync is mandatory
        file.sync_all()
            .map_err(|e| BackendError::io(format!("fsync {}", self.path.display()), e))?;
        if let Some(parent) = self.path.parent() {
            sync_dir(parent)
                .map_err(|e| BackendError::io(format!("fsync {}", parent.display()), e))?;
        }

        maybe_crash(points::MARKER_AFTER_SET);
        Ok(())
    }

    fn clear(&self) -> BackendResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BackendError::io(format!("remove {}", self.path.display()), e)),
        }
        if let Some(parent) = self.path.parent() {
            sync_dir(parent)
                .map_err(|e| BackendError::io(format!("fsync {}", parent.display()), e))?;
        }
        Ok(())
    }
}
