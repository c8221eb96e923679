//! Lifecycle logging for channels and timers.
//!
//! quartz logs only lifecycle events: channel creation, close (with the
//! pending count) and deinit (with the discarded count) at `debug`, timer
//! creation at `debug` and timer reset at `trace`. Blocking paths and error
//! returns are never logged. Without `--features tracing` the macros below
//! expand to nothing.

/// Initialize the tracing subscriber with timestamps.
///
/// Filter defaults to `quartz=debug` unless `RUST_LOG` is set. Safe to call
/// more than once; later calls keep the first subscriber. A no-op without the
/// `tracing` feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quartz=debug"));

    // A second init (e.g. from another test binary helper) is not an error.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;
