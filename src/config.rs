//! Search subsystem configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration. Search is enabled by default; RAM acceleration is not.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_MAX_FIELD_TOKENS;
use crate::search::{SearchError, SearchResult};

/// Where durable segments are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Local filesystem directory
    #[default]
    Filesystem,
    /// Document-store collections
    DocumentStore,
}

/// Search configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Whether the search subsystem is enabled (default: true)
    #[serde(default = "default_search_enabled")]
    pub search_enabled: bool,

    /// Serve reads and writes from a RAM overlay flushed to storage (default: false)
    #[serde(default)]
    pub use_ram_acceleration: bool,

    /// Storage root: directory for the filesystem backend, store root for the
    /// document-store backend (default: "./search-index")
    #[serde(default = "default_storage_location")]
    pub storage_location: PathBuf,

    /// Storage backend kind (default: filesystem)
    #[serde(default)]
    pub backend: BackendKind,

    /// Maximum queued background operations (default: 256)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum tokens taken from any one field (default: 10000)
    #[serde(default = "default_max_field_tokens")]
    pub max_field_tokens: usize,

    /// In RAM mode, schedule a flush after this many mutations (default: none)
    #[serde(default)]
    pub flush_after_mutations: Option<u64>,
}

fn default_search_enabled() -> bool {
    true
}
fn default_storage_location() -> PathBuf {
    PathBuf::from("./search-index")
}
fn default_queue_capacity() -> usize {
    256
}
fn default_max_field_tokens() -> usize {
    DEFAULT_MAX_FIELD_TOKENS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_enabled: default_search_enabled(),
            use_ram_acceleration: false,
            storage_location: default_storage_location(),
            backend: BackendKind::default(),
            queue_capacity: default_queue_capacity(),
            max_field_tokens: default_max_field_tokens(),
            flush_after_mutations: None,
        }
    }
}

impl SearchConfig {
    /// Default configuration storing the index under `location`
    pub fn with_location(location: impl AsRef<Path>) -> Self {
        Self {
            storage_location: location.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> SearchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SearchError::config_invalid(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: SearchConfig = serde_json::from_str(&content)
            .map_err(|e| SearchError::config_invalid(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> SearchResult<()> {
        if self.queue_capacity == 0 {
            return Err(SearchError::config_invalid("queue_capacity must be > 0"));
        }
        if self.max_field_tokens == 0 {
            return Err(SearchError::config_invalid("max_field_tokens must be > 0"));
        }
        if self.flush_after_mutations == Some(0) {
            return Err(SearchError::config_invalid(
                "flush_after_mutations must be > 0 when set",
            ));
        }
        if self.storage_location.as_os_str().is_empty() {
            return Err(SearchError::config_invalid("storage_location must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert!(config.search_enabled);
        assert!(!config.use_ram_acceleration);
        assert_eq!(config.backend, BackendKind::Filesystem);
        assert_eq!(config.queue_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: SearchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_backend_kind_spelling() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"backend": "document-store", "search_enabled": false}"#)
                .unwrap();
        assert_eq!(config.backend, BackendKind::DocumentStore);
        assert!(!config.search_enabled);
    }

    #[test]
    fn test_load_rejects_zero_capacity() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("search.json");
        fs::write(&path, r#"{"queue_capacity": 0}"#).unwrap();

        let err = SearchConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), SearchErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SearchConfig::load(Path::new("/nonexistent/search.json")).unwrap_err();
        assert_eq!(err.code(), SearchErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_load_valid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("search.json");
        fs::write(
            &path,
            r#"{"use_ram_acceleration": true, "storage_location": "/var/search", "flush_after_mutations": 50}"#,
        )
        .unwrap();

        let config = SearchConfig::load(&path).unwrap();
        assert!(config.use_ram_acceleration);
        assert_eq!(config.storage_location, PathBuf::from("/var/search"));
        assert_eq!(config.flush_after_mutations, Some(50));
    }
}
