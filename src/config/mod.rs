//! Configuration models for pools, queues and the scheduler.

pub mod pool;

pub use pool::{load_dotenv, PoolConfig, QueueConfig, SchedulerConfig, DEFAULT_MAX_SLEEP_MS};
