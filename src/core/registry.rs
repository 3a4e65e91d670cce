//! Bookkeeping of live worker threads.
//!
//! Records live in a map keyed by [`WorkerId`] behind their own mutex,
//! separate from the task queue lock. The counters are atomics so the
//! submit path can read them without locking. Adding or removing a record
//! and the matching counter update happen under the registry mutex; the
//! idle/busy flip of a live worker only touches its own state cell and the
//! idle count.
//!
//! The live and idle counts share one [`WorkerCounts`] word, so a single load
//! always observes `idle <= current`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Stable identity of a worker.
pub type WorkerId = u64;

/// Per-worker execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for a task (or parked while the pool is paused).
    Idle,
    /// Executing a task.
    Busy,
    /// Leaving the pool.
    Stopping,
}

impl WorkerState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Busy => 1,
            Self::Stopping => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Busy,
            _ => Self::Stopping,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// State cell shared between a worker thread and its record.
///
/// Only the owning worker writes it.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Idle.as_u8()))
    }

    #[inline]
    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Live and idle worker counts packed into one atomic word.
///
/// The high half holds the live count, the low half the idle count. Every
/// transition is a single `fetch_add`/`fetch_sub`.
#[derive(Debug)]
pub(crate) struct WorkerCounts(AtomicU64);

impl WorkerCounts {
    const IDLE: u64 = 1;
    const LIVE: u64 = 1 << 32;
    const MASK: u64 = (1 << 32) - 1;

    const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Decode `(current, idle)` from one load.
    #[inline]
    pub(crate) fn load(&self) -> (usize, usize) {
        Self::decode(self.0.load(Ordering::SeqCst))
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn decode(word: u64) -> (usize, usize) {
        ((word >> 32) as usize, (word & Self::MASK) as usize)
    }

    /// A new idle worker; returns the live count after the change.
    fn add_idle_worker(&self) -> usize {
        let previous = self.0.fetch_add(Self::LIVE | Self::IDLE, Ordering::SeqCst);
        Self::decode(previous).0 + 1
    }

    /// An idle worker leaves.
    fn remove_idle_worker(&self) {
        self.0.fetch_sub(Self::LIVE | Self::IDLE, Ordering::SeqCst);
    }

    fn busy(&self) {
        self.0.fetch_sub(Self::IDLE, Ordering::SeqCst);
    }

    fn idle(&self) {
        self.0.fetch_add(Self::IDLE, Ordering::SeqCst);
    }
}

/// Registry entry for one live worker.
struct WorkerRecord {
    state: Arc<StateCell>,
    started_at: Instant,
    stopped_at: Option<Instant>,
    thread_id: Option<ThreadId>,
    thread: Option<JoinHandle<()>>,
}

/// Point-in-time view of a worker, returned by
/// [`ThreadPool::workers`](crate::core::ThreadPool::workers).
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Worker identity.
    pub id: WorkerId,
    /// State at the time of the snapshot.
    pub state: WorkerState,
    /// When the worker was created.
    pub started_at: Instant,
    /// When the worker began stopping, if it has.
    pub stopped_at: Option<Instant>,
}

/// Registry of live workers plus the lock-free counters derived from it.
pub(crate) struct ThreadRegistry {
    records: Mutex<HashMap<WorkerId, WorkerRecord>>,
    counts: WorkerCounts,
    next_id: AtomicU64,
    spawned_total: AtomicU64,
    retired_total: AtomicU64,
    peak: AtomicUsize,
}

impl ThreadRegistry {
    pub(crate) fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            counts: WorkerCounts::new(),
            next_id: AtomicU64::new(0),
            spawned_total: AtomicU64::new(0),
            retired_total: AtomicU64::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> usize {
        self.counts.load().0
    }

    #[inline]
    pub(crate) fn idle(&self) -> usize {
        self.counts.load().1
    }

    /// `(current, idle)` observed together.
    #[inline]
    pub(crate) fn counts(&self) -> (usize, usize) {
        self.counts.load()
    }

    pub(crate) fn spawned_total(&self) -> u64 {
        self.spawned_total.load(Ordering::Relaxed)
    }

    pub(crate) fn retired_total(&self) -> u64 {
        self.retired_total.load(Ordering::Relaxed)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Register a new idle worker if the pool is below `max`.
    ///
    /// `spawn` runs under the registry lock and receives the id and state
    /// cell of the new worker. The counters are bumped before the thread
    /// exists, so the worker never observes itself uncounted; they are rolled
    /// back if `spawn` fails. Returns `Ok(None)` when the ceiling is already
    /// reached.
    pub(crate) fn register<F, E>(
        &self,
        max: usize,
        spawn: F,
    ) -> Result<Option<WorkerId>, E>
    where
        F: FnOnce(WorkerId, Arc<StateCell>) -> Result<JoinHandle<()>, E>,
    {
        let mut records = self.records.lock();
        if self.current() >= max {
            return Ok(None);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(StateCell::new());
        let current = self.counts.add_idle_worker();

        let thread = match spawn(id, Arc::clone(&state)) {
            Ok(thread) => thread,
            Err(e) => {
                self.counts.remove_idle_worker();
                return Err(e);
            }
        };

        records.insert(
            id,
            WorkerRecord {
                state,
                started_at: Instant::now(),
                stopped_at: None,
                thread_id: Some(thread.thread().id()),
                thread: Some(thread),
            },
        );
        self.spawned_total.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(current, Ordering::Relaxed);
        Ok(Some(id))
    }

    /// Move an idle worker to busy.
    pub(crate) fn mark_busy(&self, cell: &StateCell) {
        cell.set(WorkerState::Busy);
        self.counts.busy();
    }

    /// Move a busy worker back to idle.
    pub(crate) fn mark_idle(&self, cell: &StateCell) {
        cell.set(WorkerState::Idle);
        self.counts.idle();
    }

    /// Retire an idle worker if doing so keeps the pool at or above `min`.
    ///
    /// The check and the removal happen under one lock, so concurrent
    /// reapers cannot undershoot `min`.
    pub(crate) fn try_retire(&self, id: WorkerId, min: usize) -> bool {
        let mut records = self.records.lock();
        if self.current() <= min {
            return false;
        }
        self.remove_locked(&mut records, id);
        true
    }

    /// Unconditionally remove an idle worker's record (pool stop).
    pub(crate) fn deregister(&self, id: WorkerId) {
        let mut records = self.records.lock();
        self.remove_locked(&mut records, id);
    }

    fn remove_locked(&self, records: &mut HashMap<WorkerId, WorkerRecord>, id: WorkerId) {
        // Dropping the record detaches the thread if nobody took its handle.
        if records.remove(&id).is_some() {
            self.counts.remove_idle_worker();
            self.retired_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take every join handle out of the registry, skipping the calling
    /// thread's own worker.
    ///
    /// The records stay, stamped with their stop time; each worker still
    /// removes its own on exit.
    pub(crate) fn take_handles(&self, current: ThreadId) -> Vec<(WorkerId, JoinHandle<()>)> {
        let now = Instant::now();
        let mut records = self.records.lock();
        records
            .iter_mut()
            .filter(|(_, record)| record.thread_id != Some(current))
            .filter_map(|(id, record)| {
                record.stopped_at.get_or_insert(now);
                record.thread.take().map(|t| (*id, t))
            })
            .collect()
    }

    /// Snapshot of every live worker, ordered by id.
    pub(crate) fn snapshot(&self) -> Vec<WorkerInfo> {
        let records = self.records.lock();
        let mut infos: Vec<WorkerInfo> = records
            .iter()
            .map(|(id, record)| WorkerInfo {
                id: *id,
                state: record.state.get(),
                started_at: record.started_at,
                stopped_at: record.stopped_at,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::thread;

    fn spawn_noop(_: WorkerId, _: Arc<StateCell>) -> Result<JoinHandle<()>, Infallible> {
        Ok(thread::spawn(|| {}))
    }

    #[test]
    fn test_register_respects_ceiling() {
        let registry = ThreadRegistry::new();
        assert_eq!(registry.register(2, spawn_noop).unwrap(), Some(0));
        assert_eq!(registry.register(2, spawn_noop).unwrap(), Some(1));
        assert_eq!(registry.register(2, spawn_noop).unwrap(), None);

        assert_eq!(registry.current(), 2);
        assert_eq!(registry.idle(), 2);
        assert_eq!(registry.peak(), 2);
        assert_eq!(registry.spawned_total(), 2);
    }

    #[test]
    fn test_spawn_failure_leaves_counters_untouched() {
        let registry = ThreadRegistry::new();
        let result = registry.register(4, |_, _| Err::<JoinHandle<()>, _>("no threads"));
        assert_eq!(result, Err("no threads"));
        assert_eq!(registry.current(), 0);
        assert_eq!(registry.idle(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_busy_idle_transitions() {
        let registry = ThreadRegistry::new();
        let mut cell = None;
        registry
            .register(1, |id, state| {
                cell = Some(state);
                spawn_noop(id, Arc::new(StateCell::new()))
            })
            .unwrap();
        let cell = cell.unwrap();

        registry.mark_busy(&cell);
        assert_eq!(registry.idle(), 0);
        assert_eq!(registry.snapshot()[0].state, WorkerState::Busy);

        registry.mark_idle(&cell);
        assert_eq!(registry.idle(), 1);
        assert_eq!(registry.snapshot()[0].state, WorkerState::Idle);
    }

    #[test]
    fn test_try_retire_keeps_minimum() {
        let registry = ThreadRegistry::new();
        registry.register(3, spawn_noop).unwrap();
        registry.register(3, spawn_noop).unwrap();

        assert!(registry.try_retire(0, 1));
        assert!(!registry.try_retire(1, 1));
        assert_eq!(registry.current(), 1);
        assert_eq!(registry.retired_total(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_counts_never_show_more_idle_than_live() {
        let registry = Arc::new(ThreadRegistry::new());
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let reader = {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut observations = 0_u64;
                while !done.load(Ordering::Relaxed) {
                    let (current, idle) = registry.counts();
                    assert!(idle <= current, "idle {idle} > current {current}");
                    observations += 1;
                }
                observations
            })
        };

        for _ in 0..2_000 {
            let id = registry.register(4, spawn_noop).unwrap().unwrap();
            let cell = registry.records.lock()[&id].state.clone();
            registry.mark_busy(&cell);
            registry.mark_idle(&cell);
            registry.deregister(id);
        }
        done.store(true, Ordering::Relaxed);

        assert!(reader.join().unwrap() > 0);
        assert_eq!(registry.counts(), (0, 0));
    }

    #[test]
    fn test_take_handles_skips_caller() {
        let registry = ThreadRegistry::new();
        registry.register(2, spawn_noop).unwrap();
        registry.register(2, spawn_noop).unwrap();

        let handles = registry.take_handles(thread::current().id());
        assert_eq!(handles.len(), 2);
        for (_, handle) in handles {
            handle.join().unwrap();
        }
        assert!(registry.take_handles(thread::current().id()).is_empty());

        registry.deregister(0);
        registry.deregister(1);
        assert_eq!(registry.current(), 0);
        assert_eq!(registry.idle(), 0);
    }
}
