//! Crash point injection for testing durability
//!
//! Crash points are enabled via the `WEBLOG_SEARCH_CRASH_POINT` environment
//! variable. When the named point is reached the process terminates via
//! `std::process::abort()`: no cleanup, no unwinding, no catching.
//!
//! # Usage
//!
//! ```ignore
//! use weblog_search::crash_point::{maybe_crash, points};
//!
//! maybe_crash(points::FLUSH_BEFORE_COMMIT);
//! ```
//!
//! ```bash
//! WEBLOG_SEARCH_CRASH_POINT=flush_before_commit weblog-search rebuild --config search.json
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "WEBLOG_SEARCH_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Check if a specific crash point is enabled
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Index engine
    pub const COMMIT_BEFORE_POINT: &str = "commit_before_point";
    pub const COMMIT_AFTER_POINT: &str = "commit_after_point";

    // Storage backends
    pub const PURGE_AFTER_DETACH: &str = "purge_after_detach";
    pub const MARKER_AFTER_SET: &str = "marker_after_set";

    // Lifecycle
    pub const REBUILD_BEFORE_COMMIT: &str = "rebuild_before_commit";
    pub const FLUSH_BEFORE_COMMIT: &str = "flush_before_commit";
    pub const FLUSH_AFTER_COMMIT: &str = "flush_after_commit";

    /// All crash points for enumeration
    pub const ALL: &[&str] = &[
        COMMIT_BEFORE_POINT,
        COMMIT_AFTER_POINT,
        PURGE_AFTER_DETACH,
        MARKER_AFTER_SET,
        REBUILD_BEFORE_COMMIT,
        FLUSH_BEFORE_COMMIT,
        FLUSH_AFTER_COMMIT,
    ];
}
