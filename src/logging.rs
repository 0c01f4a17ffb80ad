//! Structured diagnostics setup for host applications
//!
//! The library only emits `tracing` events. Applications without their own
//! subscriber can install this JSON one.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a JSON subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    let _ = try_init_tracing();
}

/// Like [`init_tracing`], reporting an already-installed subscriber
pub fn try_init_tracing() -> Result<(), TryInitError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
