//! Timed dispatch on top of a dedicated pool.
//!
//! A [`Scheduler`] owns one [`Pool`] with two queues:
//!
//! - `scheduling` (concurrency 1) runs the monitor: a perpetual unit that pops due
//!   items from a min-heap, hands their work to the target queue, then sleeps on a
//!   private semaphore until the next due time (capped by `max_sleep`) and requeues
//!   itself.
//! - `shared` is the default delivery target.
//!
//! Scheduling an item that becomes the earliest one wakes the monitor so it can
//! shorten its sleep.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Outcome, Pool, PoolError, Queue, Stats, Work};
use crate::config::SchedulerConfig;
use crate::Semaphore;

/// Longest delay honoured as given; larger delays are clamped to it.
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + delay`, with `delay` clamped to [`MAX_DELAY`] so the sum cannot overflow.
fn deadline_after(now: Instant, delay: Duration) -> Instant {
    let delay = delay.min(MAX_DELAY);
    now.checked_add(delay)
        .or_else(|| now.checked_add(delay / 2))
        .unwrap_or(now)
}

/// One deferred delivery.
struct Item {
    target_time: Instant,
    seq: u64,
    target_queue: Arc<Queue>,
    target_work: Arc<Work>,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.target_time == other.target_time && self.seq == other.seq
    }
}

impl Eq for Item {}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Item {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed for the max-heap: earliest time first, then submission order.
        other
            .target_time
            .cmp(&self.target_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Pending {
    heap: BinaryHeap<Item>,
    next_seq: u64,
}

/// Time-ordered heap plus the wake semaphore of the monitor unit.
struct Monitor {
    pending: Mutex<Pending>,
    wake: Semaphore,
    shutdown: AtomicBool,
    max_sleep: Duration,
}

impl Monitor {
    fn new(max_sleep: Duration) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            wake: Semaphore::new(0),
            shutdown: AtomicBool::new(false),
            max_sleep,
        }
    }

    fn push(&self, target_time: Instant, target_queue: Arc<Queue>, target_work: Arc<Work>) {
        let is_earliest = {
            let mut pending = self.pending.lock();
            let seq = pending.next_seq;
            pending.next_seq += 1;
            pending.heap.push(Item {
                target_time,
                seq,
                target_queue,
                target_work,
            });
            pending.heap.peek().is_some_and(|top| top.seq == seq)
        };
        if is_earliest {
            self.wake.post();
        }
    }

    fn len(&self) -> usize {
        self.pending.lock().heap.len()
    }

    /// One housekeeping round: deliver everything due, then sleep.
    fn tick(&self) -> Outcome {
        if self.shutdown.load(Ordering::Acquire) {
            return Outcome::Done;
        }

        let now = Instant::now();
        let (due, deadline) = {
            let mut pending = self.pending.lock();
            let mut due = Vec::new();
            while pending.heap.peek().is_some_and(|top| top.target_time <= now) {
                if let Some(item) = pending.heap.pop() {
                    due.push(item);
                }
            }
            let ceiling = deadline_after(now, self.max_sleep);
            let deadline = pending
                .heap
                .peek()
                .map_or(ceiling, |top| top.target_time.min(ceiling));
            (due, deadline)
        };

        for item in due {
            debug!(queue = %item.target_queue.name(), "delivering scheduled work");
            item.target_queue.add_work(item.target_work);
        }

        self.wake.timed_wait(deadline);

        if self.shutdown.load(Ordering::Acquire) {
            Outcome::Done
        } else {
            Outcome::Requeue
        }
    }
}

/// Deferred-execution facade: a dedicated pool, a monitor queue and a shared
/// delivery queue.
///
/// Construct one per owner; dropping it (or calling [`shutdown`](Self::shutdown))
/// stops the monitor and waits for the pool's threads to exit. When the last handle
/// is released by a unit running on the scheduler's own pool, the pool is stopped
/// without waiting and its threads exit on their own. Items still in the heap at
/// that point are discarded.
pub struct Scheduler {
    pool: Arc<Pool>,
    monitor_queue: Arc<Queue>,
    shared_queue: Arc<Queue>,
    monitor: Arc<Monitor>,
    stopped: AtomicBool,
}

impl Scheduler {
    /// Build the pool and queues described by `config` and start the monitor.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidConfig`] if `config` fails validation
    /// - [`PoolError::Spawn`] if the worker threads cannot be started
    pub fn new(config: &SchedulerConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let pool = Pool::create(
            config.name.clone(),
            config.num_threads,
            Some(Stats::create(format!("{}.pool", config.name))),
        )?;
        let monitor_queue = pool.add_queue(format!("{}.scheduling", config.name), 1, None)?;
        monitor_queue.freeze();
        let shared_queue = pool.add_queue(
            format!("{}.shared", config.name),
            config.shared_concurrency(),
            None,
        )?;

        let monitor = Arc::new(Monitor::new(Duration::from_millis(config.max_sleep_ms)));
        let tick = Arc::clone(&monitor);
        monitor_queue.add_work(Work::create(
            Some(Stats::create(format!("{}.monitor", config.name))),
            move || Ok(tick.tick()),
        ));

        info!(
            scheduler = %config.name,
            num_threads = config.num_threads,
            shared_queue_concurrency = config.shared_concurrency(),
            "scheduler started"
        );

        Ok(Self {
            pool,
            monitor_queue,
            shared_queue,
            monitor,
            stopped: AtomicBool::new(false),
        })
    }

    /// Deliver `work` to the shared queue at `target_time`.
    pub fn schedule(&self, target_time: Instant, work: Arc<Work>) {
        self.schedule_on(&self.shared_queue, target_time, work);
    }

    /// Deliver `work` to `target_queue` at `target_time`.
    ///
    /// The queue may belong to any pool.
    pub fn schedule_on(&self, target_queue: &Arc<Queue>, target_time: Instant, work: Arc<Work>) {
        self.monitor.push(target_time, Arc::clone(target_queue), work);
    }

    /// Deliver `work` to the shared queue once `delay` has elapsed.
    ///
    /// Delays beyond [`MAX_DELAY`] are clamped to it.
    pub fn schedule_after(&self, delay: Duration, work: Arc<Work>) {
        self.schedule(deadline_after(Instant::now(), delay), work);
    }

    /// Number of items waiting for their due time.
    #[must_use]
    pub fn num_scheduled(&self) -> usize {
        self.monitor.len()
    }

    /// Default delivery queue.
    #[must_use]
    pub const fn shared_queue(&self) -> &Arc<Queue> {
        &self.shared_queue
    }

    /// Pool backing the scheduler.
    #[must_use]
    pub const fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Stop the monitor and wait for the pool's threads to exit. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.monitor.shutdown.store(true, Ordering::Release);
        self.monitor_queue.stop();
        self.monitor.wake.post();
        self.pool.stop(true);
        info!(scheduler = %self.pool.name(), discarded = self.monitor.len(), "scheduler shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pool", &self.pool)
            .field("scheduled", &self.monitor.len())
            .field("stopped", &self.stopped.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
