//! Shared FIFO task queue.
//!
//! One `Mutex` guards both the pending jobs and the count of jobs currently
//! executing, so "queue empty and nothing running" is observed atomically.
//! Two condvars hang off that mutex: `available` wakes workers, `drained`
//! wakes callers blocked in [`ThreadPool::wait`](crate::core::ThreadPool::wait).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::task::Job;

/// State guarded by the queue mutex.
pub(crate) struct QueueState {
    jobs: VecDeque<Box<dyn Job>>,
    active: usize,
}

impl QueueState {
    /// Pop the oldest job and count it as executing.
    pub(crate) fn claim(&mut self) -> Option<Box<dyn Job>> {
        let job = self.jobs.pop_front()?;
        self.active += 1;
        Some(job)
    }

    /// Mark a claimed job as finished. Returns `true` when the queue drained.
    pub(crate) fn complete(&mut self) -> bool {
        self.active = self.active.saturating_sub(1);
        self.is_drained()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub(crate) const fn active(&self) -> usize {
        self.active
    }

    /// No job waiting and none executing.
    #[inline]
    pub(crate) fn is_drained(&self) -> bool {
        self.jobs.is_empty() && self.active == 0
    }
}

/// Unbounded FIFO of pending jobs shared by every worker.
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    drained: Condvar,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                active: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Lock the queue state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    /// Append a job and wake one waiting worker. Returns the new depth.
    pub(crate) fn push(&self, job: Box<dyn Job>) -> usize {
        let depth = {
            let mut state = self.state.lock();
            state.jobs.push_back(job);
            state.jobs.len()
        };
        self.available.notify_one();
        depth
    }

    /// Number of jobs waiting to be claimed.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// Wait on the worker condition for at most `timeout`.
    ///
    /// Returns `true` if the wait timed out.
    pub(crate) fn wait_for_job(
        &self,
        state: &mut MutexGuard<'_, QueueState>,
        timeout: Duration,
    ) -> bool {
        self.available.wait_for(state, timeout).timed_out()
    }

    /// Notify `wait()` callers that the queue drained.
    pub(crate) fn notify_drained(&self) {
        self.drained.notify_all();
    }

    /// Block while `keep_waiting` holds, optionally bounded by `deadline`.
    ///
    /// Returns `false` if the deadline passed first.
    pub(crate) fn wait_drained<F>(&self, deadline: Option<Instant>, mut keep_waiting: F) -> bool
    where
        F: FnMut(&QueueState) -> bool,
    {
        let mut state = self.state.lock();
        while keep_waiting(&state) {
            match deadline {
                Some(deadline) => {
                    if self.drained.wait_until(&mut state, deadline).timed_out() {
                        return !keep_waiting(&state);
                    }
                }
                None => self.drained.wait(&mut state),
            }
        }
        true
    }

    /// Wake every worker and every `wait()` caller.
    ///
    /// Takes the lock first so a thread that checked the pool status under
    /// this lock is already waiting when the notification fires.
    pub(crate) fn wake_all(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
        self.drained.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::wrap;
    use crate::core::TaskError;

    fn job(value: u32) -> (Box<dyn Job>, crate::core::TaskHandle<u32>) {
        wrap(move || Ok::<_, TaskError>(value))
    }

    #[test]
    fn test_claim_is_fifo() {
        let queue = TaskQueue::new();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let (job, handle) = job(i);
                queue.push(job);
                handle
            })
            .collect();
        assert_eq!(queue.len(), 3);

        for (i, handle) in handles.iter().enumerate() {
            let claimed = queue.lock().claim().unwrap();
            claimed.run();
            assert_eq!(handle.get().unwrap(), u32::try_from(i).unwrap());
            for later in &handles[i + 1..] {
                assert!(!later.is_finished());
            }
        }
    }

    #[test]
    fn test_drained_tracks_active_jobs() {
        let queue = TaskQueue::new();
        let (j, _handle) = job(1);
        queue.push(j);

        let mut state = queue.lock();
        assert!(!state.is_drained());
        let claimed = state.claim().unwrap();
        assert!(state.is_empty());
        assert_eq!(state.active(), 1);
        assert!(!state.is_drained());

        claimed.run();
        assert!(state.complete());
    }

    #[test]
    fn test_wait_drained_times_out() {
        let queue = TaskQueue::new();
        let (j, _handle) = job(1);
        queue.push(j);
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(!queue.wait_drained(Some(deadline), |s| !s.is_drained()));
    }

    #[test]
    fn test_wait_for_job_times_out_when_empty() {
        let queue = TaskQueue::new();
        let mut state = queue.lock();
        assert!(queue.wait_for_job(&mut state, Duration::from_millis(5)));
    }
}
