//! # Prometheus Thread Pool
//!
//! An elastic worker thread pool for offloading blocking or CPU-bound work.
//!
//! The pool runs submitted closures on a set of OS threads whose size moves
//! between a configured minimum and maximum. Threads are added under
//! submission pressure and retire on their own after sitting idle. Each
//! submission returns a [`TaskHandle`] through which the caller blocks on,
//! or polls for, the closure's value or failure.
//!
//! ## Key Features
//!
//! - **Elastic sizing**: grows by one worker when a task arrives and none is
//!   idle, never beyond `max_workers`; idle workers above `min_workers`
//!   retire after `max_idle_time`
//! - **Lifecycle control**: `start`, `stop`, `pause`, `resume`, `wait`
//! - **Auto-start**: submitting to a stopped pool starts it
//! - **FIFO**: one shared queue, tasks are claimed in submission order
//! - **Failure isolation**: panics and `Err` results land in the task's
//!   handle and never take down a worker
//!
//! ## Example
//!
//! ```rust
//! use prometheus_thread_pool::{ThreadPool, TaskError};
//! use std::time::Duration;
//!
//! let pool = ThreadPool::builder()
//!     .min_workers(1)
//!     .max_workers(4)
//!     .max_idle_time(Duration::from_millis(50))
//!     .build()
//!     .unwrap();
//!
//! let sum = pool.submit_with((2, 3), |(a, b)| a + b);
//! let failed = pool.try_submit(|| Err::<u32, _>(anyhow::anyhow!("no input")));
//!
//! pool.wait();
//! assert_eq!(sum.get().unwrap(), 5);
//! assert!(matches!(failed.get(), Err(TaskError::Failed(_))));
//! ```
//!
//! Configuration can also be loaded from JSON or the environment, see
//! [`config::ThreadPoolConfig`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Pool controller, workers, queue and result handles.
pub mod core;
/// Configuration models for thread pools.
pub mod config;
/// Builders to construct pools from code or configuration.
pub mod builders;
/// Shared utilities.
pub mod util;

pub use crate::builders::ThreadPoolBuilder;
pub use crate::config::ThreadPoolConfig;
pub use crate::core::{
    AppResult, PoolError, PoolStats, PoolStatus, TaskError, TaskHandle, TaskResult, ThreadPool,
    WorkerId, WorkerInfo, WorkerState,
};
