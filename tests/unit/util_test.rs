//! Tests for utility functions

use prometheus_thread_pool::util::{init_tracing, DEFAULT_LOG_FILTER};

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_LOG_FILTER.starts_with("prometheus_thread_pool"));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
