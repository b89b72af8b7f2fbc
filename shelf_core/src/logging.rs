//! Tracing setup for the `shelf` binary.
//!
//! Every subcommand writes its machine-readable result to stdout: `ingest`
//! prints one JSON response, `run` streams one per input line, `export
//! --stdout` writes CSV. Diagnostics therefore always go to stderr.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber at INFO, or whatever RUST_LOG asks for
pub fn init() {
    init_with_level("info")
}

/// Install the subscriber with `default_level` when RUST_LOG is unset
///
/// Transitions are logged at INFO, rejected reports at ERROR and skipped
/// keys or odd presence values at DEBUG.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Route engine logs into the test harness output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
