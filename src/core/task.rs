//! Task wrapping and result handles.
//!
//! A submitted closure is boxed into a [`Job`] that owns both the closure and
//! the write side of a result slot. The caller keeps a [`TaskHandle`] onto the
//! same slot.
//!
//! # Design
//!
//! - Per-slot `Mutex` + `Condvar`, no polling
//! - Outcome written exactly once, by the job
//! - Panics are caught at the job boundary and never reach the worker
//! - A job dropped without running resolves its handle to [`TaskError::Abandoned`]
//! - The outcome stays in the slot while more than one handle is alive

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::TaskError;

/// Outcome of a task as observed through its handle.
pub type TaskResult<T> = Result<T, TaskError>;

/// A type-erased unit of work held by the task queue.
pub(crate) trait Job: Send {
    /// Execute the work and publish its outcome.
    ///
    /// Returns `false` if the task failed or panicked.
    fn run(self: Box<Self>) -> bool;
}

/// Slot state.
enum SlotState<T> {
    /// Waiting for the job to run.
    Pending,
    /// Outcome is available.
    Ready(TaskResult<T>),
}

/// Result slot shared by a job and every clone of its handle.
struct ResultSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    /// Live `TaskHandle`s onto this slot.
    handles: AtomicUsize,
}

impl<T> ResultSlot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
            handles: AtomicUsize::new(1),
        }
    }

    /// Lock the slot once the outcome is available.
    fn wait_ready(&self) -> parking_lot::MutexGuard<'_, SlotState<T>> {
        let mut state = self.state.lock();
        while matches!(*state, SlotState::Pending) {
            self.ready.wait(&mut state);
        }
        state
    }

    /// Move the outcome out of a ready slot.
    ///
    /// Only called by the last live handle, so nobody observes the slot
    /// falling back to `Pending`.
    fn take(state: &mut SlotState<T>) -> Option<TaskResult<T>> {
        match std::mem::replace(state, SlotState::Pending) {
            SlotState::Ready(outcome) => Some(outcome),
            SlotState::Pending => None,
        }
    }

    /// Publish the outcome and wake every observer. Later writes are ignored.
    fn fulfill(&self, outcome: TaskResult<T>) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Ready(outcome);
            self.ready.notify_all();
        }
    }
}

/// Job implementation binding a closure to its result slot.
struct Task<F, T> {
    func: Option<F>,
    slot: Arc<ResultSlot<T>>,
}

impl<F, T> Job for Task<F, T>
where
    F: FnOnce() -> TaskResult<T> + Send,
    T: Send,
{
    fn run(mut self: Box<Self>) -> bool {
        let Some(func) = self.func.take() else {
            return false;
        };
        let outcome = match panic::catch_unwind(AssertUnwindSafe(func)) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(panic = %message, "task panicked");
                Err(TaskError::Panicked(message))
            }
        };
        let succeeded = outcome.is_ok();
        self.slot.fulfill(outcome);
        succeeded
    }
}

impl<F, T> Drop for Task<F, T> {
    fn drop(&mut self) {
        if self.func.is_some() {
            self.slot.fulfill(Err(TaskError::Abandoned));
        }
    }
}

/// Box `func` as a queue job and return the handle observing it.
///
/// Nothing runs here: `func` has already captured its arguments and is only
/// invoked once a worker calls [`Job::run`].
pub(crate) fn wrap<F, T>(func: F) -> (Box<dyn Job>, TaskHandle<T>)
where
    F: FnOnce() -> TaskResult<T> + Send + 'static,
    T: Send + 'static,
{
    let slot = Arc::new(ResultSlot::new());
    let job = Box::new(Task {
        func: Some(func),
        slot: Arc::clone(&slot),
    });
    (job, TaskHandle { slot })
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to the eventual outcome of a submitted task.
///
/// Handles are cheap to clone; every clone observes the same outcome, and
/// the outcome is kept until the last clone has read it or been dropped.
///
/// ```
/// use prometheus_thread_pool::ThreadPool;
///
/// let pool = ThreadPool::new();
/// let handle = pool.submit(|| 6 * 7);
/// assert_eq!(handle.get().unwrap(), 42);
/// ```
pub struct TaskHandle<T> {
    slot: Arc<ResultSlot<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        self.slot.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        self.slot.handles.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T> TaskHandle<T> {
    /// Returns `true` once the task has produced an outcome.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(*self.slot.state.lock(), SlotState::Pending)
    }

    /// Block until the task has produced an outcome.
    pub fn wait(&self) {
        drop(self.slot.wait_ready());
    }

    /// Block until the task finishes or `timeout` elapses.
    ///
    /// Returns `true` if the outcome is available.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Pending) {
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return !matches!(*state, SlotState::Pending);
            }
        }
        true
    }

    /// `true` if no other clone of this handle is alive.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.slot.handles.load(Ordering::Acquire) == 1
    }

    /// Block until the outcome is available and move it out, for any `T`.
    ///
    /// Only the last live handle may take the outcome. While other clones
    /// are alive the handle is given back unchanged in `Err`.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` if other handles still observe the outcome.
    pub fn into_result(self) -> Result<TaskResult<T>, Self> {
        let taken = {
            let mut state = self.slot.wait_ready();
            if self.is_unique() {
                ResultSlot::take(&mut state)
            } else {
                None
            }
        };
        taken.ok_or(self)
    }
}

impl<T: Clone> TaskHandle<T> {
    /// Block until the outcome is available and return a copy of it.
    ///
    /// May be called any number of times from any number of handles.
    ///
    /// # Errors
    ///
    /// Returns the task's failure.
    pub fn get(&self) -> TaskResult<T> {
        let state = self.slot.wait_ready();
        Self::read(&state)
    }

    /// Return a copy of the outcome if it is available, without blocking.
    #[must_use]
    pub fn try_get(&self) -> Option<TaskResult<T>> {
        let state = self.slot.state.lock();
        match *state {
            SlotState::Pending => None,
            SlotState::Ready(_) => Some(Self::read(&state)),
        }
    }

    /// Block until the outcome is available and return it, consuming the
    /// handle.
    ///
    /// The last live handle moves the outcome out; otherwise it is copied
    /// and left for the remaining clones.
    ///
    /// # Errors
    ///
    /// Returns the task's failure.
    pub fn join(self) -> TaskResult<T> {
        let mut state = self.slot.wait_ready();
        if self.is_unique() {
            if let Some(outcome) = ResultSlot::take(&mut state) {
                return outcome;
            }
        }
        Self::read(&state)
    }

    fn read(state: &SlotState<T>) -> TaskResult<T> {
        match state {
            SlotState::Ready(outcome) => outcome.clone(),
            SlotState::Pending => Err(TaskError::Abandoned),
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl<T: Clone + Send + 'static> TaskHandle<T> {
    /// Await the outcome from async code.
    ///
    /// The blocking wait is moved onto tokio's blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns the task's failure, or `Panicked` if the blocking wait itself
    /// could not complete.
    pub async fn join_async(self) -> TaskResult<T> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .map_err(|e| TaskError::Panicked(e.to_string()))?
    }
}
