//! Structured logging for buffer waits and wake-ups.
//!
//! Compiled in with `--features tracing`. Without the feature every macro
//! below expands to nothing, so the blocking paths carry no logging cost.

/// Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG`.
///
/// Falls back to `conveyor=trace` when `RUST_LOG` is unset. Safe to call
/// more than once; later calls leave the first subscriber in place.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conveyor=trace"));

    // A second registry in the same process is not an error worth surfacing.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! disabled {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as trace;
