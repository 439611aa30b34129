//! Tests for utility functions

use prometheus_task_runtime::util::{init_test_tracing, init_tracing, DEFAULT_FILTER};

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_FILTER.starts_with("prometheus_task_runtime="));
}

#[test]
fn test_tracing_init_is_repeatable() {
    init_test_tracing();
    init_test_tracing();
    init_tracing();
    tracing::info!("subscriber installed");
}
