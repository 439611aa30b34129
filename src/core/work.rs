//! Units of executable work.

use std::fmt;
use std::sync::Arc;

use super::{AppResult, Stats};

/// What a queue should do with a unit after it ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    /// The unit is finished.
    #[default]
    Done,
    /// Append the same unit to the tail of the queue it ran on.
    Requeue,
}

type WorkFn = dyn Fn() -> AppResult<Outcome> + Send + Sync + 'static;

/// An immutable, reusable unit of executable logic with optional statistics.
///
/// Running a `Work` never mutates it; the requeue decision is returned as an
/// [`Outcome`]. The same `Arc<Work>` can therefore be submitted to many queues and
/// run concurrently.
///
/// `Work` performs no failure containment: errors are returned and panics unwind
/// out of [`run`](Self::run). Containment is the executing
/// [`Queue`](crate::core::Queue)'s job.
///
/// # Example
///
/// ```
/// use prometheus_task_runtime::core::{Outcome, Stats, Work};
///
/// let stats = Stats::create("hello");
/// let work = Work::create(Some(stats.clone()), || Ok(Outcome::Done));
/// assert_eq!(work.run().unwrap(), Outcome::Done);
/// assert_eq!(stats.count(), 1);
/// ```
pub struct Work {
    body: Box<WorkFn>,
    stats: Option<Arc<Stats>>,
}

impl Work {
    /// Create a shared unit of work.
    pub fn create<F>(stats: Option<Arc<Stats>>, body: F) -> Arc<Self>
    where
        F: Fn() -> AppResult<Outcome> + Send + Sync + 'static,
    {
        Arc::new(Self {
            body: Box::new(body),
            stats,
        })
    }

    /// Create a unit from an infallible closure that never requeues.
    pub fn from_fn<F>(body: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::create(None, move || {
            body();
            Ok(Outcome::Done)
        })
    }

    /// Invoke the body, inside the stats timing scope when stats are attached.
    ///
    /// # Errors
    ///
    /// Returns whatever error the body returns.
    pub fn run(&self) -> AppResult<Outcome> {
        let _scope = self.stats.as_ref().map(|stats| stats.begin());
        (self.body)()
    }

    /// Attached statistics handle.
    #[must_use]
    pub fn stats(&self) -> Option<&Arc<Stats>> {
        self.stats.as_ref()
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("stats", &self.stats.as_ref().map(|s| s.name()))
            .finish_non_exhaustive()
    }
}
