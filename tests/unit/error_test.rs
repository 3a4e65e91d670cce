//! Tests for error types

use prometheus_thread_pool::{AppResult, PoolError, TaskError};

#[test]
fn test_invalid_config_error() {
    let err = PoolError::InvalidConfig("max_workers must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_workers must be greater than 0"
    );
}

#[test]
fn test_thread_spawn_error_from_io() {
    let err: PoolError = std::io::Error::other("resource limit").into();
    assert!(matches!(err, PoolError::ThreadSpawn(_)));
    assert_eq!(format!("{}", err), "failed to spawn worker thread: resource limit");
}

#[test]
fn test_task_error_messages() {
    assert_eq!(
        format!("{}", TaskError::Panicked("boom".to_string())),
        "task panicked: boom"
    );
    assert_eq!(
        format!("{}", TaskError::Abandoned),
        "task abandoned before execution"
    );
}

#[test]
fn test_failed_wraps_any_error() {
    let err = TaskError::failed(std::io::Error::other("disk full"));
    assert_eq!(format!("{}", err), "task failed: disk full");

    // Clones share the same underlying error.
    let cloned = err.clone();
    match (err, cloned) {
        (TaskError::Failed(a), TaskError::Failed(b)) => assert!(std::sync::Arc::ptr_eq(&a, &b)),
        _ => panic!("expected Failed"),
    }
}

#[test]
fn test_app_result_accepts_pool_errors() {
    fn build() -> AppResult<()> {
        Err(PoolError::InvalidConfig("bad".to_string()))?;
        Ok(())
    }
    let err = build().unwrap_err();
    assert!(err.downcast_ref::<PoolError>().is_some());
}
