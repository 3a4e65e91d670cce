//! Worker thread fetch/execute loop.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::pool::Shared;
use super::registry::{StateCell, WorkerId, WorkerState};
use super::status::PoolStatus;
use super::task::Job;

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The pool was stopped.
    Stopped,
    /// Idle longer than the idle timeout while above the minimum.
    Reaped,
}

/// Result of one attempt to fetch work.
enum Fetch {
    /// A job was claimed; the worker is now busy.
    Job(Box<dyn Job>),
    /// The pool left `Running`; re-check the status.
    Recheck,
    /// The worker retired itself.
    Retired,
}

/// A background thread pulling jobs from the shared queue.
pub(crate) struct Worker {
    id: WorkerId,
    state: Arc<StateCell>,
    shared: Arc<Shared>,
}

/// Spawn a worker thread.
pub(crate) fn spawn_worker(
    shared: Arc<Shared>,
    id: WorkerId,
    state: Arc<StateCell>,
) -> io::Result<JoinHandle<()>> {
    let (name, stack_size) = {
        let config = shared.config.read();
        (format!("{}-{id}", config.thread_name_prefix), config.stack_size)
    };

    let mut builder = thread::Builder::new().name(name);
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    let worker = Worker { id, state, shared };
    builder.spawn(move || worker.run())
}

impl Worker {
    fn run(self) {
        debug!(worker_id = self.id, "Worker thread started");
        let exit = self.work_loop();
        debug!(worker_id = self.id, reason = ?exit, "Worker thread exiting");
    }

    fn work_loop(&self) -> Exit {
        loop {
            match self.shared.lifecycle.get() {
                PoolStatus::Stopped => {
                    // A concurrent `start` counts this worker towards its
                    // target, so leave only while the gate still says Stopped.
                    let gate = self.shared.lifecycle.lock();
                    if gate.get() != PoolStatus::Stopped {
                        continue;
                    }
                    self.state.set(WorkerState::Stopping);
                    self.shared.registry.deregister(self.id);
                    return Exit::Stopped;
                }
                PoolStatus::Paused => {
                    self.shared.lifecycle.wait_while_paused();
                    continue;
                }
                PoolStatus::Running => {}
            }

            match self.fetch() {
                Fetch::Job(job) => self.execute(job),
                Fetch::Recheck => {}
                Fetch::Retired => return Exit::Reaped,
            }
        }
    }

    /// Wait for a job while the pool is running.
    ///
    /// The status is re-read under the queue lock on every wakeup, and stop,
    /// pause and push all notify under that same lock, so no wakeup is lost.
    fn fetch(&self) -> Fetch {
        let queue = &self.shared.queue;
        let mut state = queue.lock();
        loop {
            if self.shared.lifecycle.get() != PoolStatus::Running {
                return Fetch::Recheck;
            }

            if let Some(job) = state.claim() {
                self.shared.registry.mark_busy(&self.state);
                return Fetch::Job(job);
            }

            let idle_time = self.shared.config.read().max_idle_time;
            let timed_out = queue.wait_for_job(&mut state, idle_time);

            // Retire under the queue lock: a concurrent submit either pushed
            // before this check (queue not empty) or sees the lowered count.
            if timed_out && state.is_empty() && self.shared.lifecycle.get() == PoolStatus::Running {
                let min = self.shared.config.read().min_workers;
                if self.shared.registry.try_retire(self.id, min) {
                    self.state.set(WorkerState::Stopping);
                    debug!(worker_id = self.id, "Worker idle timeout, retiring");
                    return Fetch::Retired;
                }
            }
        }
    }

    fn execute(&self, job: Box<dyn Job>) {
        debug!(worker_id = self.id, "Worker executing task");
        let succeeded = job.run();
        self.shared.counters.record(succeeded);

        let mut state = self.shared.queue.lock();
        self.shared.registry.mark_idle(&self.state);
        if state.complete() {
            self.shared.queue.notify_drained();
        }
    }
}
