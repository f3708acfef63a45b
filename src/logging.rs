//! Logging - tracing Subscriber for the CLI
//!
//! Library code only emits events; binaries decide where they go.

use tracing::Level;
use tracing_subscriber::fmt;

/// Human-readable logs on stderr; stdout is reserved for JSON output.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
