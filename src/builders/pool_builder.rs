//! Fluent construction of a [`ThreadPool`].

use std::time::Duration;

use crate::config::ThreadPoolConfig;
use crate::core::{PoolError, ThreadPool};

/// Builder for [`ThreadPool`].
///
/// ```
/// use prometheus_thread_pool::ThreadPool;
/// use std::time::Duration;
///
/// let pool = ThreadPool::builder()
///     .min_workers(2)
///     .max_workers(8)
///     .max_idle_time(Duration::from_millis(100))
///     .thread_name_prefix("render")
///     .build()
///     .unwrap();
/// assert!(pool.is_stopped());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ThreadPoolBuilder {
    config: ThreadPoolConfig,
}

impl ThreadPoolBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub const fn from_config(config: ThreadPoolConfig) -> Self {
        Self { config }
    }

    /// Floor on live workers.
    #[must_use]
    pub fn min_workers(mut self, min_workers: usize) -> Self {
        self.config.min_workers = min_workers;
        self
    }

    /// Ceiling on live workers.
    #[must_use]
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Idle time before an above-minimum worker retires.
    #[must_use]
    pub fn max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.config.max_idle_time = max_idle_time;
        self
    }

    /// Prefix for worker thread names.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Stack size for worker threads.
    #[must_use]
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.config.stack_size = Some(stack_size);
        self
    }

    /// The configuration built so far.
    #[must_use]
    pub const fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Build a stopped pool.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn build(self) -> Result<ThreadPool, PoolError> {
        ThreadPool::with_config(self.config)
    }

    /// Build a pool and start it with `initial_workers` threads.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` for an invalid configuration, or
    /// `PoolError::ThreadSpawn` if a worker could not be created.
    pub fn build_started(self, initial_workers: usize) -> Result<ThreadPool, PoolError> {
        let pool = self.build()?;
        pool.start_with(initial_workers)?;
        Ok(pool)
    }
}
