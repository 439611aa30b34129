//! Work units, governed queues, the worker pool and the timed scheduler.

pub mod error;
pub mod listener;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod work;

pub use error::{AppResult, PoolError, QueueError, WorkError};
pub use listener::{ListenerId, Listeners};
pub use pool::Pool;
pub use queue::Queue;
pub use scheduler::{Scheduler, MAX_DELAY};
pub use stats::{Stats, StatsScope, StatsSnapshot};
pub use work::{Outcome, Work};
