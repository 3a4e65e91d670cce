//! Pool controller, worker loop, task queue and result handles.

pub mod error;
pub mod pool;
pub mod registry;
pub mod stats;
pub mod status;
pub mod task;

mod queue;
mod worker;

pub use error::{AppResult, PoolError, TaskError};
pub use pool::ThreadPool;
pub use registry::{WorkerId, WorkerInfo, WorkerState};
pub use stats::PoolStats;
pub use status::PoolStatus;
pub use task::{TaskHandle, TaskResult};
