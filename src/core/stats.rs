//! Execution statistics.
//!
//! A [`Stats`] handle accumulates how many units ran and how long they took. Timing
//! is recorded through the RAII [`StatsScope`] returned by [`Stats::begin`], so a unit
//! that panics is still accounted for when the scope unwinds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Named, thread-safe run counter plus accumulated run time.
#[derive(Debug)]
pub struct Stats {
    name: String,
    count: AtomicU64,
    run_time_nanos: AtomicU64,
    active: AtomicU64,
}

/// Point-in-time copy of a [`Stats`] handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Stats name.
    pub name: String,
    /// Completed runs.
    pub count: u64,
    /// Accumulated run time in milliseconds.
    pub run_time_ms: u128,
    /// Runs currently inside a scope.
    pub active: u64,
}

impl Stats {
    /// Create a new shared stats handle.
    pub fn create(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            count: AtomicU64::new(0),
            run_time_nanos: AtomicU64::new(0),
            active: AtomicU64::new(0),
        })
    }

    /// Stats name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of completed runs.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Accumulated run time across all completed runs.
    #[must_use]
    pub fn run_time(&self) -> Duration {
        Duration::from_nanos(self.run_time_nanos.load(Ordering::Acquire))
    }

    /// Number of runs currently in progress.
    #[must_use]
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Acquire)
    }

    /// Open a timing scope. The run is recorded when the returned guard drops.
    #[must_use = "the run is recorded when the scope is dropped"]
    pub fn begin(&self) -> StatsScope<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        StatsScope {
            stats: self,
            started: Instant::now(),
        }
    }

    /// Take a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            name: self.name.clone(),
            count: self.count(),
            run_time_ms: self.run_time().as_millis(),
            active: self.active(),
        }
    }

    fn end(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.run_time_nanos.fetch_add(nanos, Ordering::AcqRel);
        self.count.fetch_add(1, Ordering::AcqRel);
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Guard recording one run into its [`Stats`] on drop.
#[derive(Debug)]
pub struct StatsScope<'a> {
    stats: &'a Stats,
    started: Instant,
}

impl Drop for StatsScope<'_> {
    fn drop(&mut self) {
        self.stats.end(self.started.elapsed());
    }
}
