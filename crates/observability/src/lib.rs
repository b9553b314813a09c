//! Process-wide tracing setup.
//!
//! Structured JSON logs with an env-driven filter. Every other crate only
//! depends on the `tracing` macros; wiring the subscriber happens once, here.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
