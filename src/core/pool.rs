//! Elastic worker thread pool.
//!
//! The pool keeps between `min_workers` and `max_workers` OS threads pulling
//! from one shared FIFO queue. Threads are added when a task is submitted and
//! no worker is idle, and retire on their own after `max_idle_time` without
//! work while the pool is above its minimum.
//!
//! # Lifecycle
//!
//! ```text
//!            start / submit          pause
//!  Stopped ─────────────────▶ Running ─────▶ Paused
//!     ▲                        │  ▲            │
//!     │          stop          │  └── resume ──┘
//!     └────────────────────────┴───────────────┘
//! ```
//!
//! # Stop policy
//!
//! `stop` does not drain the queue. Tasks still queued stay there with their
//! handles pending and run first if the pool is started again. Dropping the
//! pool discards them and their handles resolve to
//! [`TaskError::Abandoned`](crate::core::TaskError::Abandoned).
//!
//! # Locking
//!
//! Nested acquisitions always follow control → gate → queue → registry →
//! config.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ThreadPoolConfig;

use super::error::{PoolError, TaskError};
use super::queue::TaskQueue;
use super::registry::{ThreadRegistry, WorkerInfo};
use super::stats::{PoolStats, TaskCounters};
use super::status::{Lifecycle, PoolStatus};
use super::task::{self, TaskHandle, TaskResult};
use super::worker::spawn_worker;

/// State shared by the controller and every worker.
pub(crate) struct Shared {
    pub(crate) config: RwLock<ThreadPoolConfig>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) queue: TaskQueue,
    pub(crate) registry: ThreadRegistry,
    pub(crate) counters: TaskCounters,
}

impl Shared {
    /// Spawn one worker unless the pool is at `max_workers`.
    ///
    /// Returns `Ok(false)` when the ceiling was already reached.
    fn create_worker(self: &Arc<Self>) -> Result<bool, PoolError> {
        let max = self.config.read().max_workers;
        let spawned = self
            .registry
            .register(max, |id, state| spawn_worker(Arc::clone(self), id, state));

        match spawned {
            Ok(Some(id)) => {
                debug!(
                    worker_id = id,
                    current = self.registry.current(),
                    "Worker created"
                );
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.counters.spawn_failures.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::ThreadSpawn(e))
            }
        }
    }
}

/// Dynamically sized pool of worker threads.
///
/// ```
/// use prometheus_thread_pool::ThreadPool;
/// use std::time::Duration;
///
/// let pool = ThreadPool::with_limits(1, 4, Duration::from_millis(50)).unwrap();
/// let handles: Vec<_> = (0..8).map(|i| pool.submit(move || i * 2)).collect();
/// pool.wait();
///
/// let results: Vec<_> = handles.iter().map(|h| h.get().unwrap()).collect();
/// assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,

    /// Serializes `start` and `stop`.
    control: Mutex<()>,
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (current, idle) = self.shared.registry.counts();
        f.debug_struct("ThreadPool")
            .field("status", &self.status())
            .field("current_workers", &current)
            .field("idle_workers", &idle)
            .field("queued_tasks", &self.queued_tasks())
            .finish()
    }
}

impl ThreadPool {
    /// Create a stopped pool with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(ThreadPoolConfig::default())
    }

    /// Create a stopped pool from `config`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        Ok(Self::from_valid_config(config))
    }

    /// Create a stopped pool with explicit scaling limits.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if `max_workers < min_workers`,
    /// `max_workers == 0` or `max_idle_time` is zero.
    pub fn with_limits(
        min_workers: usize,
        max_workers: usize,
        max_idle_time: Duration,
    ) -> Result<Self, PoolError> {
        Self::with_config(ThreadPoolConfig {
            min_workers,
            max_workers,
            max_idle_time,
            ..ThreadPoolConfig::default()
        })
    }

    /// Start building a pool.
    #[must_use]
    pub fn builder() -> crate::builders::ThreadPoolBuilder {
        crate::builders::ThreadPoolBuilder::new()
    }

    fn from_valid_config(config: ThreadPoolConfig) -> Self {
        debug!(
            min_workers = config.min_workers,
            max_workers = config.max_workers,
            max_idle_ms = u64::try_from(config.max_idle_time.as_millis()).unwrap_or(u64::MAX),
            "ThreadPool created"
        );
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                lifecycle: Lifecycle::new(),
                queue: TaskQueue::new(),
                registry: ThreadRegistry::new(),
                counters: TaskCounters::default(),
            }),
            control: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the pool with `min_workers` threads.
    ///
    /// # Errors
    ///
    /// See [`start_with`](Self::start_with).
    pub fn start(&self) -> Result<PoolStatus, PoolError> {
        self.start_with(0)
    }

    /// Start the pool.
    ///
    /// Moves `Stopped` or `Paused` to `Running` and tops the live worker
    /// count up to `max(initial_workers, min_workers)`, capped at
    /// `max_workers`. Workers still alive from before a `stop` count towards
    /// the target. Does nothing if the pool is already running.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ThreadSpawn` if a thread could not be created.
    /// Workers spawned before the failure keep running and the pool stays
    /// `Running`.
    pub fn start_with(&self, initial_workers: usize) -> Result<PoolStatus, PoolError> {
        let _control = self.control.lock();
        self.start_locked(initial_workers)
    }

    fn start_locked(&self, initial_workers: usize) -> Result<PoolStatus, PoolError> {
        {
            let gate = self.shared.lifecycle.lock();
            if gate.get() == PoolStatus::Running {
                return Ok(PoolStatus::Running);
            }
            gate.set(PoolStatus::Running);
        }

        let target = {
            let config = self.shared.config.read();
            initial_workers
                .max(config.min_workers)
                .min(config.max_workers)
        };
        while self.shared.registry.current() < target {
            if !self.shared.create_worker()? {
                break;
            }
        }

        info!(
            current_workers = self.shared.registry.current(),
            queued_tasks = self.shared.queue.len(),
            "ThreadPool started"
        );
        Ok(PoolStatus::Running)
    }

    /// Stop the pool.
    ///
    /// Every worker finishes the task it is running, if any, and exits; this
    /// call joins them. Queued tasks are kept (see the module docs).
    /// Callers blocked in [`wait`](Self::wait) are released. Calling `stop`
    /// on a stopped pool does nothing.
    ///
    /// When called from inside a task running on this pool, the calling
    /// worker is not joined; it exits once its task returns.
    pub fn stop(&self) -> PoolStatus {
        if self.shared.lifecycle.get() == PoolStatus::Stopped {
            return PoolStatus::Stopped;
        }

        let _control = self.control.lock();
        {
            let gate = self.shared.lifecycle.lock();
            if gate.get() == PoolStatus::Stopped {
                return PoolStatus::Stopped;
            }
            gate.set(PoolStatus::Stopped);
        }
        self.shared.queue.wake_all();

        let handles = self.shared.registry.take_handles(thread::current().id());
        let joined = handles.len();
        for (worker_id, handle) in handles {
            if handle.join().is_err() {
                warn!(worker_id = worker_id, "Worker panicked");
            } else {
                debug!(worker_id = worker_id, "Worker joined successfully");
            }
        }

        info!(
            worker_count = joined,
            queued_tasks = self.shared.queue.len(),
            "ThreadPool stopped"
        );
        PoolStatus::Stopped
    }

    /// Pause the pool.
    ///
    /// Only a running pool pauses. Workers finish their current task, then
    /// park without retiring until [`resume`](Self::resume).
    pub fn pause(&self) -> PoolStatus {
        {
            let gate = self.shared.lifecycle.lock();
            if gate.get() != PoolStatus::Running {
                return gate.get();
            }
            gate.set(PoolStatus::Paused);
        }
        // Move idle workers off the timed queue wait and onto the gate.
        self.shared.queue.wake_all();
        info!("ThreadPool paused");
        PoolStatus::Paused
    }

    /// Resume a paused pool. Does nothing in any other state.
    pub fn resume(&self) -> PoolStatus {
        let gate = self.shared.lifecycle.lock();
        if gate.get() != PoolStatus::Paused {
            return gate.get();
        }
        gate.set(PoolStatus::Running);
        drop(gate);
        info!("ThreadPool resumed");
        PoolStatus::Running
    }

    /// Block until the queue is empty and no task is running, or the pool
    /// is stopped.
    ///
    /// Must not be called from a task running on this pool.
    pub fn wait(&self) {
        let lifecycle = &self.shared.lifecycle;
        self.shared.queue.wait_drained(None, |queue| {
            !queue.is_drained() && lifecycle.get() != PoolStatus::Stopped
        });
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// Returns `true` if the pool drained or stopped in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let lifecycle = &self.shared.lifecycle;
        let deadline = Instant::now() + timeout;
        self.shared.queue.wait_drained(Some(deadline), |queue| {
            !queue.is_drained() && lifecycle.get() != PoolStatus::Stopped
        })
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Submit a closure for execution and return a handle to its result.
    ///
    /// Never blocks on the work itself. A stopped pool is started first.
    /// If no worker is idle and the pool is below `max_workers`, one more
    /// worker is spawned. A panic inside `func` is reported through the
    /// handle as [`TaskError::Panicked`].
    pub fn submit<F, T>(&self, func: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(move || Ok(func()))
    }

    /// Submit `func` to be applied to `args` on a worker.
    ///
    /// `args` is captured now; `func(args)` runs later.
    pub fn submit_with<A, F, T>(&self, args: A, func: F) -> TaskHandle<T>
    where
        A: Send + 'static,
        F: FnOnce(A) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(move || Ok(func(args)))
    }

    /// Submit a fallible closure.
    ///
    /// An `Err` returned by `func` is stored in the handle as
    /// [`TaskError::Failed`].
    pub fn try_submit<F, T, E>(&self, func: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error>,
    {
        self.enqueue(move || func().map_err(TaskError::failed))
    }

    fn enqueue<F, T>(&self, func: F) -> TaskHandle<T>
    where
        F: FnOnce() -> TaskResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_started();
        self.scale_up();

        let (job, handle) = task::wrap(func);
        let depth = self.shared.queue.push(job);
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(queued_tasks = depth, "Task submitted to thread pool");

        // The last worker may have retired between the scale-up check and
        // the push; never leave a running pool with work and no threads.
        if self.shared.lifecycle.get() == PoolStatus::Running
            && self.shared.registry.current() == 0
        {
            self.spawn_for_submit();
        }

        handle
    }

    /// Auto-start step of `submit`.
    ///
    /// Skipped while a `start`/`stop` is in progress so `submit` never
    /// blocks; the task then waits in the queue.
    fn ensure_started(&self) {
        if self.shared.lifecycle.get() != PoolStatus::Stopped {
            return;
        }
        let Some(_control) = self.control.try_lock() else {
            debug!("Start/stop in progress; task queued without auto-start");
            return;
        };
        if let Err(e) = self.start_locked(0) {
            warn!(error = %e, "Auto-start failed; task stays queued");
        }
    }

    /// Eager scale-up step of `submit`.
    fn scale_up(&self) {
        if self.shared.lifecycle.get() == PoolStatus::Stopped {
            return;
        }
        let registry = &self.shared.registry;
        if registry.idle() == 0 && registry.current() < self.max_workers() {
            self.spawn_for_submit();
        }
    }

    fn spawn_for_submit(&self) {
        if let Err(e) = self.shared.create_worker() {
            warn!(error = %e, "Worker scale-up failed; task stays queued");
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> ThreadPoolConfig {
        self.shared.config.read().clone()
    }

    /// Floor on live workers.
    #[must_use]
    pub fn min_workers(&self) -> usize {
        self.shared.config.read().min_workers
    }

    /// Ceiling on live workers.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.shared.config.read().max_workers
    }

    /// Idle time before an above-minimum worker retires.
    #[must_use]
    pub fn max_idle_time(&self) -> Duration {
        self.shared.config.read().max_idle_time
    }

    /// Set the floor on live workers.
    ///
    /// Takes effect on future scaling decisions; no thread is spawned here.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if `min_workers > max_workers`.
    pub fn set_min_workers(&self, min_workers: usize) -> Result<(), PoolError> {
        self.update_config(|config| config.min_workers = min_workers)
    }

    /// Set the ceiling on live workers.
    ///
    /// Workers above a lowered ceiling are not stopped; they retire once
    /// idle.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if `max_workers < min_workers` or
    /// `max_workers == 0`.
    pub fn set_max_workers(&self, max_workers: usize) -> Result<(), PoolError> {
        self.update_config(|config| config.max_workers = max_workers)
    }

    /// Set the idle time before an above-minimum worker retires.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if `max_idle_time` is zero.
    pub fn set_max_idle_time(&self, max_idle_time: Duration) -> Result<(), PoolError> {
        self.update_config(|config| config.max_idle_time = max_idle_time)
    }

    fn update_config<F>(&self, apply: F) -> Result<(), PoolError>
    where
        F: FnOnce(&mut ThreadPoolConfig),
    {
        let mut config = self.shared.config.write();
        let mut next = config.clone();
        apply(&mut next);
        next.validate().map_err(PoolError::InvalidConfig)?;
        *config = next;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.shared.lifecycle.get()
    }

    /// `true` while running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status() == PoolStatus::Running
    }

    /// `true` while running or paused.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.status() != PoolStatus::Stopped
    }

    /// `true` while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.status() == PoolStatus::Paused
    }

    /// `true` while stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.status() == PoolStatus::Stopped
    }

    /// Live worker threads.
    #[must_use]
    pub fn current_worker_count(&self) -> usize {
        self.shared.registry.current()
    }

    /// Live workers not executing a task.
    #[must_use]
    pub fn idle_worker_count(&self) -> usize {
        self.shared.registry.idle()
    }

    /// Tasks waiting in the queue.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.shared.queue.len()
    }

    /// Snapshot of every live worker.
    #[must_use]
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.shared.registry.snapshot()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (queued_tasks, active_tasks) = {
            let queue = self.shared.queue.lock();
            (queue.len(), queue.active())
        };
        let registry = &self.shared.registry;
        let counters = &self.shared.counters;
        let (current_workers, idle_workers) = registry.counts();
        PoolStats {
            status: self.status(),
            current_workers,
            idle_workers,
            peak_workers: registry.peak(),
            active_tasks,
            queued_tasks,
            submitted_tasks: counters.submitted(),
            completed_tasks: counters.completed(),
            failed_tasks: counters.failed(),
            spawned_workers: registry.spawned_total(),
            retired_workers: registry.retired_total(),
            spawn_failures: counters.spawn_failures(),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}
