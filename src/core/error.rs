//! Error types for queue, pool and work execution.

use thiserror::Error;

/// Contract violations reported by a [`Queue`](crate::core::Queue).
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue is frozen and its concurrency limit can no longer change.
    #[error("queue `{queue}` is frozen at concurrency {current}, cannot set {requested}")]
    Frozen {
        /// Queue name.
        queue: String,
        /// Frozen concurrency limit.
        current: usize,
        /// Rejected limit.
        requested: usize,
    },
    /// A concurrency limit of zero was requested.
    #[error("queue `{queue}` requires a concurrency limit greater than 0")]
    ZeroConcurrency {
        /// Queue name.
        queue: String,
    },
}

/// Failure of a single unit of work.
///
/// Fatal only to that unit's result: the queue finishes its bookkeeping and the
/// worker thread keeps running.
#[derive(Debug, Error)]
pub enum WorkError {
    /// The work body returned an error.
    #[error("work failed: {0:#}")]
    Failed(#[source] anyhow::Error),
    /// The work body panicked.
    #[error("work panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    /// Build a `Panicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::Panicked(panic_message(payload))
    }
}

/// Errors produced by pools and the scheduler built on them.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The OS refused to start a worker thread.
    #[error("pool `{pool}` failed to spawn worker thread: {source}")]
    Spawn {
        /// Pool name.
        pool: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Creating or configuring a queue failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal error (blocking task join failure and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result using anyhow; the return type of every work body.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
