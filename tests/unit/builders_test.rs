//! Tests for builder modules

use std::time::Duration;

use prometheus_thread_pool::builders::ThreadPoolBuilder;
use prometheus_thread_pool::config::ThreadPoolConfig;
use prometheus_thread_pool::{PoolError, PoolStatus};

#[test]
fn test_pool_builder_defaults() {
    let builder = ThreadPoolBuilder::new();
    assert_eq!(builder.config(), &ThreadPoolConfig::default());
}

#[test]
fn test_pool_builder_from_config() {
    let config = ThreadPoolConfig {
        min_workers: 2,
        max_workers: 3,
        ..ThreadPoolConfig::default()
    };
    let pool = ThreadPoolBuilder::from_config(config)
        .max_idle_time(Duration::from_millis(40))
        .build()
        .unwrap();

    assert_eq!(pool.min_workers(), 2);
    assert_eq!(pool.max_workers(), 3);
    assert_eq!(pool.max_idle_time(), Duration::from_millis(40));
    assert_eq!(pool.status(), PoolStatus::Stopped);
}

#[test]
fn test_pool_builder_rejects_invalid_limits() {
    let result = ThreadPoolBuilder::new().min_workers(4).max_workers(2).build();
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}

#[test]
fn test_pool_builder_build_started() {
    let pool = ThreadPoolBuilder::new()
        .min_workers(1)
        .max_workers(4)
        .build_started(3)
        .unwrap();
    assert!(pool.is_running());
    assert_eq!(pool.current_worker_count(), 3);
}

#[test]
fn test_pool_builder_stack_size() {
    let pool = ThreadPoolBuilder::new()
        .max_workers(1)
        .stack_size(256 * 1024)
        .build()
        .unwrap();
    assert_eq!(pool.config().stack_size, Some(256 * 1024));
    assert_eq!(pool.submit(|| 7).get().unwrap(), 7);
}
