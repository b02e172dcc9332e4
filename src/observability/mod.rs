//! Observability for weblog-search
//!
//! - Structured logging through `tracing`, one record per event, with the
//!   typed [`Event`] name in the `event` field
//! - Monotonic counters in [`MetricsRegistry`]
//!
//! Observability is read-only: nothing here influences index behavior.

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{MetricsRegistry, MetricsSnapshot};

use tracing_subscriber::EnvFilter;

/// Install a JSON log subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
