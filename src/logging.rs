//! Tracing subscriber setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. `RUST_LOG` always wins over the verbosity flag:
//!
//!   txnest -v ...                 # debug: every physical call
//!   RUST_LOG=txnest=trace txnest  # also logical (nested) calls

use tracing_subscriber::EnvFilter;

/// Error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install a compact stderr subscriber.
pub fn init_tracing(verbose: bool) -> Result<(), InitError> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
}
