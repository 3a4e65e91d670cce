//! Error types for pool management and task outcomes.

use std::sync::Arc;

use thiserror::Error;

/// Errors produced by pool management operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The operating system refused to create a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Failure outcome stored in a [`TaskHandle`](crate::core::TaskHandle).
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The task panicked while running.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task returned an error.
    #[error("task failed: {0}")]
    Failed(Arc<anyhow::Error>),
    /// The task was dropped from the queue without running.
    #[error("task abandoned before execution")]
    Abandoned,
}

impl TaskError {
    /// Wrap an error returned by a fallible task.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(err.into()))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
