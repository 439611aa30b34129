//! Tracing subscriber setup.
//!
//! The runtime only emits `tracing` events; installing a subscriber is left to the
//! embedding application. These helpers cover the common cases.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "prometheus_task_runtime=info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install a `RUST_LOG`-driven fmt subscriber unless one is already set.
///
/// Falls back to [`DEFAULT_FILTER`].
pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Like [`init_tracing`] with a caller-chosen fallback filter.
pub fn init_tracing_with(fallback: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_thread_names(true)
        .try_init();
}

/// Subscriber for tests: output is captured by the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("prometheus_task_runtime=debug"))
        .with_thread_names(true)
        .with_test_writer()
        .try_init();
}
