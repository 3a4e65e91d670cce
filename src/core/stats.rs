//! Pool statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::status::PoolStatus;

/// Snapshot of pool utilization, returned by
/// [`ThreadPool::stats`](crate::core::ThreadPool::stats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Lifecycle status.
    pub status: PoolStatus,

    /// Live worker threads.
    pub current_workers: usize,

    /// Live workers not executing a task.
    pub idle_workers: usize,

    /// Highest live worker count observed.
    pub peak_workers: usize,

    /// Tasks currently executing.
    pub active_tasks: usize,

    /// Tasks waiting in the queue.
    pub queued_tasks: usize,

    /// Total tasks submitted.
    pub submitted_tasks: u64,

    /// Total tasks that completed successfully.
    pub completed_tasks: u64,

    /// Total tasks that failed or panicked.
    pub failed_tasks: u64,

    /// Total worker threads created.
    pub spawned_workers: u64,

    /// Total worker threads that left the pool.
    pub retired_workers: u64,

    /// Worker creations refused by the operating system.
    pub spawn_failures: u64,
}

impl PoolStats {
    /// Fraction of live workers currently busy, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.current_workers == 0 {
            return 0.0;
        }
        let busy = self.current_workers.saturating_sub(self.idle_workers);
        busy as f64 / self.current_workers as f64
    }
}

/// Task counters (lock-free atomics).
#[derive(Debug, Default)]
pub(crate) struct TaskCounters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub spawn_failures: AtomicU64,
}

impl TaskCounters {
    /// Record the outcome of one executed task.
    pub fn record(&self, succeeded: bool) {
        if succeeded {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn spawn_failures(&self) -> u64 {
        self.spawn_failures.load(Ordering::Relaxed)
    }
}
