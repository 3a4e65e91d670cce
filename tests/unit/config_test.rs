//! Tests for configuration validation

use std::time::Duration;

use prometheus_thread_pool::config::pool::{
    DEFAULT_MAX_IDLE_TIME, DEFAULT_MIN_WORKERS, DEFAULT_THREAD_NAME_PREFIX, ENV_MAX_IDLE_MS,
    ENV_MAX_WORKERS, ENV_MIN_WORKERS, ENV_THREAD_NAME,
};
use prometheus_thread_pool::config::{default_max_workers, ThreadPoolConfig};

fn config(min_workers: usize, max_workers: usize, idle_ms: u64) -> ThreadPoolConfig {
    ThreadPoolConfig {
        min_workers,
        max_workers,
        max_idle_time: Duration::from_millis(idle_ms),
        ..ThreadPoolConfig::default()
    }
}

#[test]
fn test_pool_config_validation() {
    assert!(config(1, 4, 50).validate().is_ok());
    assert!(config(0, 1, 1).validate().is_ok());
    assert!(config(4, 4, 50).validate().is_ok());
}

#[test]
fn test_pool_config_defaults() {
    let cfg = ThreadPoolConfig::default();
    assert_eq!(cfg.min_workers, DEFAULT_MIN_WORKERS);
    assert_eq!(cfg.max_workers, default_max_workers());
    assert_eq!(cfg.max_idle_time, DEFAULT_MAX_IDLE_TIME);
    assert_eq!(cfg.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
    assert_eq!(cfg.stack_size, None);
}

#[test]
fn test_pool_config_invalid_max_workers() {
    assert!(config(0, 0, 50).validate().is_err());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_pool_config_max_workers_ceiling() {
    let too_many = usize::try_from(u64::from(u32::MAX) + 1).unwrap();
    assert!(config(1, too_many, 50).validate().is_err());
    assert!(config(1, u32::MAX as usize, 50).validate().is_ok());
}

#[test]
fn test_pool_config_max_below_min() {
    let err = config(5, 2, 50).validate().unwrap_err();
    assert!(err.contains("min_workers"));
}

#[test]
fn test_pool_config_invalid_idle_time() {
    assert!(config(1, 2, 0).validate().is_err());
}

#[test]
fn test_pool_config_invalid_stack_size() {
    let cfg = ThreadPoolConfig {
        stack_size: Some(0),
        ..ThreadPoolConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_pool_config_from_json() {
    let json = r#"{
        "min_workers": 2,
        "max_workers": 8,
        "max_idle_time_ms": 120,
        "thread_name_prefix": "ingest",
        "stack_size": 1048576
    }"#;
    let cfg = ThreadPoolConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.min_workers, 2);
    assert_eq!(cfg.max_workers, 8);
    assert_eq!(cfg.max_idle_time, Duration::from_millis(120));
    assert_eq!(cfg.thread_name_prefix, "ingest");
    assert_eq!(cfg.stack_size, Some(1_048_576));
}

#[test]
fn test_pool_config_from_json_rejects_invalid() {
    assert!(ThreadPoolConfig::from_json_str(r#"{"min_workers": 3, "max_workers": 1}"#).is_err());
    assert!(ThreadPoolConfig::from_json_str("not json").is_err());
}

#[test]
fn test_pool_config_from_env() {
    std::env::set_var(ENV_MIN_WORKERS, "2");
    std::env::set_var(ENV_MAX_WORKERS, " 6 ");
    std::env::set_var(ENV_MAX_IDLE_MS, "40");
    std::env::set_var(ENV_THREAD_NAME, "env-pool");

    let cfg = ThreadPoolConfig::from_env().unwrap();
    assert_eq!(cfg.min_workers, 2);
    assert_eq!(cfg.max_workers, 6);
    assert_eq!(cfg.max_idle_time, Duration::from_millis(40));
    assert_eq!(cfg.thread_name_prefix, "env-pool");

    std::env::set_var(ENV_MAX_WORKERS, "many");
    let err = ThreadPoolConfig::from_env().unwrap_err();
    assert!(err.contains(ENV_MAX_WORKERS));

    for key in [ENV_MIN_WORKERS, ENV_MAX_WORKERS, ENV_MAX_IDLE_MS, ENV_THREAD_NAME] {
        std::env::remove_var(key);
    }
}
