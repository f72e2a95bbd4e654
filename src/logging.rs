//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the level follows the CLI verbosity.

use tracing_subscriber::EnvFilter;

use crate::cli::Verbosity;

/// Install the global tracing subscriber. Logs go to stderr so answers on
/// stdout stay pipeable.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
