//! Tracing setup for the hosting process
//!
//! The engine itself only emits `tracing` events; installing a
//! subscriber is the host's call, made once at startup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a formatted subscriber honoring `RUST_LOG`, defaulting to
/// `info` (or `debug` when `debug_logging` is set).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(debug_logging: bool) {
    let default_filter = if debug_logging { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
