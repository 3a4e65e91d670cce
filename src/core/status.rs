//! Pool lifecycle status and the pause gate.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`ThreadPool`](crate::core::ThreadPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// No task runs and no worker is kept alive.
    Stopped,
    /// Workers pull and execute tasks.
    Running,
    /// Workers stay alive but do not start new tasks.
    Paused,
}

impl PoolStatus {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Running => 1,
            Self::Paused => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Authoritative status value plus the condition paused workers block on.
///
/// Reads are lock free. Every transition happens while holding the gate
/// mutex so a worker checking the status under the same mutex cannot miss
/// the wakeup that follows it.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    status: AtomicU8,
    gate: Mutex<()>,
    gate_cv: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU8::new(PoolStatus::Stopped.as_u8()),
            gate: Mutex::new(()),
            gate_cv: Condvar::new(),
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> PoolStatus {
        PoolStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Lock the gate; transitions must be made through the returned guard.
    pub(crate) fn lock(&self) -> GateGuard<'_> {
        GateGuard {
            lifecycle: self,
            _guard: self.gate.lock(),
        }
    }

    /// Block the calling worker while the pool is paused.
    pub(crate) fn wait_while_paused(&self) {
        let mut guard = self.gate.lock();
        while self.get() == PoolStatus::Paused {
            self.gate_cv.wait(&mut guard);
        }
    }
}

/// Exclusive access to status transitions.
pub(crate) struct GateGuard<'a> {
    lifecycle: &'a Lifecycle,
    _guard: MutexGuard<'a, ()>,
}

impl GateGuard<'_> {
    #[inline]
    pub(crate) fn get(&self) -> PoolStatus {
        self.lifecycle.get()
    }

    /// Store `next` and wake every worker parked on the gate.
    pub(crate) fn set(&self, next: PoolStatus) {
        self.lifecycle.status.store(next.as_u8(), Ordering::SeqCst);
        self.lifecycle.gate_cv.notify_all();
    }
}
