//! # Prometheus Task Runtime
//!
//! A process-local concurrent task-execution runtime for the Prometheus AI Platform.
//!
//! A bounded pool of OS worker threads drains units of work from several
//! independently governed queues, and a scheduler built on a dedicated pool delivers
//! work into queues when its due time arrives.
//!
//! ## Components
//!
//! - **[`Semaphore`]**: counting wait/signal primitive with a bounded timed wait.
//! - **[`Work`](core::Work)**: immutable, reusable unit of logic with optional
//!   [`Stats`](core::Stats); running it yields an [`Outcome`](core::Outcome).
//! - **[`Queue`](core::Queue)**: ordered backlog bound to a shared semaphore, with a
//!   per-queue concurrency cap, stop/start/freeze state and idle notifications.
//! - **[`Pool`](core::Pool)**: detached worker threads that wake on the shared
//!   semaphore and pick work round-robin across the pool's queues.
//! - **[`Scheduler`](core::Scheduler)**: a monitor unit popping due items from a
//!   min-heap and injecting them into their target queue.
//!
//! ## Pool
//!
//! ```rust,no_run
//! use prometheus_task_runtime::core::{Pool, Work};
//!
//! let pool = Pool::create("io", 4, None)?;
//! let uploads = pool.add_queue("uploads", 2, None)?;
//! let thumbnails = pool.add_queue("thumbnails", 1, None)?;
//!
//! uploads.add_work(Work::from_fn(|| println!("upload")));
//! thumbnails.add_work(Work::from_fn(|| println!("thumbnail")));
//!
//! // Everything queued so far runs, then every queue is stopped.
//! pool.flush();
//! pool.stop(true);
//! # Ok::<(), prometheus_task_runtime::core::PoolError>(())
//! ```
//!
//! ## Scheduler
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use prometheus_task_runtime::config::SchedulerConfig;
//! use prometheus_task_runtime::core::{Scheduler, Work};
//!
//! let scheduler = Scheduler::new(&SchedulerConfig::new("timers").with_num_threads(2))?;
//! scheduler.schedule_after(Duration::from_millis(50), Work::from_fn(|| println!("tick")));
//! # Ok::<(), prometheus_task_runtime::core::PoolError>(())
//! ```
//!
//! ## Failure handling
//!
//! A unit that returns an error or panics never corrupts queue or pool state: the
//! queue completes its bookkeeping and returns the failure, and the pool worker logs
//! it through `tracing` and keeps looping.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Work units, queues, the worker pool and the scheduler.
pub mod core;
/// Configuration models for pools, queues and the scheduler.
pub mod config;
/// Builders to construct pools from configuration.
pub mod builders;
/// Counting semaphore.
pub mod semaphore;
/// Shared utilities.
pub mod util;

pub use semaphore::Semaphore;
