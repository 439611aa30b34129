//! Concurrency-governed work queue.
//!
//! A [`Queue`] is an ordered backlog of [`Work`] bound to a *shared* [`Semaphore`].
//! It never runs anything itself: it signals the semaphore when it has dispatchable
//! work and spare capacity, and a pool worker that consumed such a signal calls
//! [`Queue::next`] followed by exactly one [`Queue::run`].
//!
//! # Accounting
//!
//! - `cur` is the number of dispatched, not yet finished units.
//! - `posted` is the number of semaphore signals issued by this queue that no worker
//!   has turned into a dispatch yet.
//! - `posted + cur <= max_concurrency` holds outside every critical section.
//!
//! Every mutation happens under the queue's own lock; semaphore posts and idle
//! notifications are issued only after that lock is released.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Listeners, Outcome, QueueError, Stats, Work, WorkError};
use crate::Semaphore;

/// Mutable queue state, guarded by the queue lock.
#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Arc<Work>>,
    max_concurrency: usize,
    cur_concurrency: usize,
    posted: usize,
    busy: bool,
    stopped: bool,
    frozen: bool,
}

impl QueueState {
    /// Reserve as many semaphore signals as capacity and backlog allow.
    ///
    /// Returns how many posts the caller must issue once the lock is released.
    fn reserve_posts(&mut self) -> usize {
        let mut posts = 0;
        while !self.stopped
            && self.posted + self.cur_concurrency < self.max_concurrency
            && self.pending.len() > self.posted
        {
            self.posted += 1;
            posts += 1;
        }
        posts
    }

    fn refresh_busy(&mut self) {
        self.busy = !self.pending.is_empty() || self.cur_concurrency > 0;
    }

    fn is_idle(&self) -> bool {
        self.cur_concurrency == 0 && self.posted == 0 && self.pending.is_empty() && !self.stopped
    }
}

/// An ordered backlog of work with its own concurrency cap and run/stop state.
///
/// Created through [`Queue::create`] or [`Pool::add_queue`](crate::core::Pool::add_queue)
/// and always handed out as `Arc<Queue>`.
pub struct Queue {
    name: String,
    semaphore: Arc<Semaphore>,
    state: Mutex<QueueState>,
    stats: Arc<Stats>,
    stopped_stats: Arc<Stats>,
    stop_marker: Arc<Work>,
    on_idle: Listeners<Self>,
}

impl Queue {
    /// Create a running queue signalling `semaphore`.
    ///
    /// `stats` records every executed unit; when `None` a stats handle named after
    /// the queue is created.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ZeroConcurrency`] if `max_concurrency` is 0.
    pub fn create(
        name: impl Into<String>,
        semaphore: Arc<Semaphore>,
        max_concurrency: usize,
        stats: Option<Arc<Stats>>,
    ) -> Result<Arc<Self>, QueueError> {
        let name = name.into();
        if max_concurrency == 0 {
            return Err(QueueError::ZeroConcurrency { queue: name });
        }

        let stats = stats.unwrap_or_else(|| Stats::create(name.clone()));
        let stopped_stats = Stats::create(format!("{name}.stopped"));
        let stop_marker = Work::create(Some(Arc::clone(&stopped_stats)), || Ok(Outcome::Done));

        Ok(Arc::new(Self {
            name,
            semaphore,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                max_concurrency,
                cur_concurrency: 0,
                posted: 0,
                busy: false,
                stopped: false,
                frozen: false,
            }),
            stats,
            stopped_stats,
            stop_marker,
            on_idle: Listeners::new(),
        }))
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `work` to the tail of the backlog.
    pub fn add_work(&self, work: Arc<Work>) {
        let posts = {
            let mut state = self.state.lock();
            state.pending.push_back(work);
            state.busy = true;
            state.reserve_posts()
        };
        self.post(posts);
    }

    /// Atomically append `last` followed by the stop marker.
    ///
    /// Everything queued up to and including `last` drains, then the queue stops
    /// itself and [`stopped_stats`](Self::stopped_stats) records the marker's run.
    pub fn stop_after(&self, last: Arc<Work>) {
        let posts = {
            let mut state = self.state.lock();
            self.push_stop_after(&mut state, last);
            state.reserve_posts()
        };
        self.post(posts);
    }

    /// [`stop_after`](Self::stop_after), unless the queue is already stopped.
    ///
    /// The check and the enqueue happen under one lock. Returns whether `last` was
    /// queued.
    pub fn stop_after_if_running(&self, last: Arc<Work>) -> bool {
        let posts = {
            let mut state = self.state.lock();
            if state.stopped {
                return false;
            }
            self.push_stop_after(&mut state, last);
            state.reserve_posts()
        };
        self.post(posts);
        true
    }

    fn push_stop_after(&self, state: &mut QueueState, last: Arc<Work>) {
        state.pending.push_back(last);
        state.pending.push_back(Arc::clone(&self.stop_marker));
        state.busy = true;
    }

    /// Stop dispatching. Outstanding signals become moot; running units finish.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.posted = 0;
        drop(state);
        debug!(queue = %self.name, "queue stopped");
    }

    /// Resume dispatching.
    ///
    /// When the queue was stopped with nothing pending and nothing running, the idle
    /// listeners fire immediately.
    pub fn start(&self) {
        let (posts, idle) = {
            let mut state = self.state.lock();
            let was_stopped = state.stopped;
            state.stopped = false;
            let idle = was_stopped && state.pending.is_empty() && state.cur_concurrency == 0;
            (state.reserve_posts(), idle)
        };
        debug!(queue = %self.name, posts, "queue started");
        self.post(posts);
        if idle {
            self.on_idle.notify(self);
        }
    }

    /// Drop every pending (not yet dispatched) unit. Running units are unaffected.
    pub fn clear(&self) {
        let (dropped, idle) = {
            let mut state = self.state.lock();
            let was_busy = state.busy;
            let dropped = state.pending.len();
            state.pending.clear();
            state.posted = 0;
            state.refresh_busy();
            (dropped, was_busy && state.is_idle())
        };
        debug!(queue = %self.name, dropped, "queue cleared");
        if idle {
            self.on_idle.notify(self);
        }
    }

    /// Freeze the concurrency limit. One-way.
    pub fn freeze(&self) {
        self.state.lock().frozen = true;
    }

    /// Change the concurrency limit.
    ///
    /// Raising it posts for the newly available capacity. Lowering it only caps
    /// future dispatches; running units are not interrupted.
    ///
    /// # Errors
    ///
    /// - [`QueueError::ZeroConcurrency`] if `max_concurrency` is 0
    /// - [`QueueError::Frozen`] if the queue is frozen and the value would change
    pub fn set_max_concurrency(&self, max_concurrency: usize) -> Result<(), QueueError> {
        if max_concurrency == 0 {
            return Err(QueueError::ZeroConcurrency {
                queue: self.name.clone(),
            });
        }

        let posts = {
            let mut state = self.state.lock();
            if state.frozen && state.max_concurrency != max_concurrency {
                let current = state.max_concurrency;
                drop(state);
                warn!(queue = %self.name, current, requested = max_concurrency, "rejected concurrency change on frozen queue");
                return Err(QueueError::Frozen {
                    queue: self.name.clone(),
                    current,
                    requested: max_concurrency,
                });
            }
            state.max_concurrency = max_concurrency;
            // Signals beyond the lowered cap are withdrawn; the tokens already in
            // the semaphore turn into empty wake-ups.
            let spare = max_concurrency.saturating_sub(state.cur_concurrency);
            state.posted = state.posted.min(spare);
            state.reserve_posts()
        };
        self.post(posts);
        Ok(())
    }

    /// Extract the head of the backlog if this queue holds an unconsumed signal and
    /// has spare capacity.
    ///
    /// A returned unit must be handed to exactly one later [`run`](Self::run).
    pub fn next(&self) -> Option<Arc<Work>> {
        let mut state = self.state.lock();
        if state.stopped
            || state.posted == 0
            || state.cur_concurrency >= state.max_concurrency
            || state.pending.is_empty()
        {
            return None;
        }
        let work = state.pending.pop_front()?;
        state.posted -= 1;
        state.cur_concurrency += 1;
        Some(work)
    }

    /// Execute a unit previously returned by [`next`](Self::next).
    ///
    /// The unit runs inside this queue's stats scope. Errors and panics are captured,
    /// the post-run bookkeeping (release the slot, requeue, re-post, idle check)
    /// always happens, and only then is the captured failure returned. Idle
    /// listeners fire after the queue lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`WorkError`] if the unit returned an error or panicked.
    pub fn run(&self, work: Arc<Work>) -> Result<(), WorkError> {
        let result = {
            let _scope = self.stats.begin();
            match panic::catch_unwind(AssertUnwindSafe(|| work.run())) {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(err)) => Err(WorkError::Failed(err)),
                Err(payload) => Err(WorkError::from_panic(payload.as_ref())),
            }
        };
        let is_stop_marker = Arc::ptr_eq(&work, &self.stop_marker);

        let (posts, idle) = {
            let mut state = self.state.lock();
            state.cur_concurrency -= 1;
            if matches!(result, Ok(Outcome::Requeue)) {
                state.pending.push_back(work);
            }
            if is_stop_marker {
                state.stopped = true;
                state.posted = 0;
            }
            let posts = state.reserve_posts();
            state.refresh_busy();
            (posts, state.is_idle())
        };

        if is_stop_marker {
            debug!(queue = %self.name, "queue stopped by marker");
        }
        self.post(posts);
        if idle {
            self.on_idle.notify(self);
        }
        result.map(|_| ())
    }

    /// Whether anything is pending or running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Whether dispatching is stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Whether the concurrency limit is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state.lock().frozen
    }

    /// Number of dispatched units not yet finished.
    #[must_use]
    pub fn current_concurrency(&self) -> usize {
        self.state.lock().cur_concurrency
    }

    /// Concurrency limit.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.state.lock().max_concurrency
    }

    /// Number of units waiting for dispatch.
    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of issued but unconsumed semaphore signals.
    #[must_use]
    pub fn num_posted(&self) -> usize {
        self.state.lock().posted
    }

    /// Idle-transition listeners.
    #[must_use]
    pub const fn on_idle(&self) -> &Listeners<Self> {
        &self.on_idle
    }

    /// Stats recording every executed unit.
    #[must_use]
    pub const fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Stats recording executions of the stop marker.
    #[must_use]
    pub const fn stopped_stats(&self) -> &Arc<Stats> {
        &self.stopped_stats
    }

    fn post(&self, posts: usize) {
        for _ in 0..posts {
            self.semaphore.post();
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("pending", &state.pending.len())
            .field("max_concurrency", &state.max_concurrency)
            .field("cur_concurrency", &state.cur_concurrency)
            .field("posted", &state.posted)
            .field("busy", &state.busy)
            .field("stopped", &state.stopped)
            .field("frozen", &state.frozen)
            .finish()
    }
}
