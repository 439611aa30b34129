//! Worker pool draining a set of queues through one shared semaphore.
//!
//! Every queue registered with a [`Pool`] posts to the pool's shared [`Semaphore`].
//! A worker blocks on that semaphore, then scans the queues round-robin starting
//! after the last queue *it* visited, dispatches the first unit it finds, runs it
//! through the owning queue and loops.
//!
//! # Design
//!
//! - **Detached workers**: threads are never joined; the live count is tracked by
//!   the threads themselves and `stop(true)` waits on a done-semaphore instead.
//! - **Explicit handle**: each worker owns a clone of the `Arc<Pool>` it serves.
//! - **Log and continue**: a failing unit is logged, the worker keeps looping.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::{PoolError, Queue, Stats, Work};
use crate::Semaphore;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Id of the pool the current thread works for, if any.
    static WORKER_OF: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Queue list and thread accounting, guarded by the pool lock.
#[derive(Debug, Default)]
struct PoolState {
    queues: Vec<Arc<Queue>>,
    /// Threads inside their run loop.
    live: usize,
    /// Threads spawned but not yet inside their run loop.
    starting: usize,
    /// Monotonic id for thread names.
    spawned: usize,
}

/// A bounded set of detached worker threads draining one or more queues.
pub struct Pool {
    id: u64,
    name: String,
    state: Mutex<PoolState>,
    running: AtomicBool,
    semaphore: Arc<Semaphore>,
    done: Semaphore,
    stats: Arc<Stats>,
}

impl Pool {
    /// Create a pool and start `num_threads` workers.
    ///
    /// `stats` records every unit executed by the pool's threads; when `None` a
    /// stats handle named after the pool is created.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread cannot be started.
    pub fn create(
        name: impl Into<String>,
        num_threads: usize,
        stats: Option<Arc<Stats>>,
    ) -> Result<Arc<Self>, PoolError> {
        let name = name.into();
        let stats = stats.unwrap_or_else(|| Stats::create(name.clone()));
        let pool = Arc::new(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            name,
            state: Mutex::new(PoolState::default()),
            running: AtomicBool::new(true),
            semaphore: Arc::new(Semaphore::new(0)),
            done: Semaphore::new(0),
            stats,
        });
        pool.set_num_threads(num_threads)?;

        info!(pool = %pool.name, num_threads, "pool initialized");
        Ok(pool)
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a queue bound to this pool's shared semaphore and register it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Queue`] if `max_concurrency` is 0.
    pub fn add_queue(
        &self,
        name: impl Into<String>,
        max_concurrency: usize,
        stats: Option<Arc<Stats>>,
    ) -> Result<Arc<Queue>, PoolError> {
        let queue = Queue::create(name, Arc::clone(&self.semaphore), max_concurrency, stats)?;
        self.state.lock().queues.push(Arc::clone(&queue));
        debug!(pool = %self.name, queue = %queue.name(), max_concurrency, "queue registered");
        Ok(queue)
    }

    /// Snapshot of the registered queues, in registration order.
    #[must_use]
    pub fn queues(&self) -> Vec<Arc<Queue>> {
        self.state.lock().queues.clone()
    }

    /// Mark the pool running and spawn workers until `n` are live or starting.
    ///
    /// Never stops surplus threads; lowering the count only happens through
    /// [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread cannot be started. Threads
    /// spawned before the failure keep running.
    pub fn set_num_threads(self: &Arc<Self>, n: usize) -> Result<(), PoolError> {
        self.running.store(true, Ordering::SeqCst);

        let to_spawn = {
            let mut state = self.state.lock();
            let current = state.live + state.starting;
            let to_spawn = n.saturating_sub(current);
            state.starting += to_spawn;
            to_spawn
        };

        for spawned in 0..to_spawn {
            if let Err(err) = self.spawn_worker() {
                let mut state = self.state.lock();
                state.starting -= to_spawn - spawned;
                drop(state);
                error!(pool = %self.name, error = %err, "failed to spawn worker thread");
                return Err(PoolError::Spawn {
                    pool: self.name.clone(),
                    source: err,
                });
            }
        }

        if to_spawn > 0 {
            debug!(pool = %self.name, target = n, spawned = to_spawn, "worker threads requested");
        }
        Ok(())
    }

    /// Number of threads currently inside their run loop.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.state.lock().live
    }

    /// Whether workers are allowed to keep looping.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stats recording every unit run by this pool.
    #[must_use]
    pub const fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Ask every worker to exit after its current unit.
    ///
    /// When `wait` is true, blocks until no worker is live or starting. Called from
    /// one of this pool's own workers (a unit dropping the last handle to its
    /// owner, for instance) the call never waits, since that worker only exits
    /// after returning.
    pub fn stop(&self, wait: bool) {
        let wait = wait && !self.is_current_worker();
        self.running.store(false, Ordering::SeqCst);
        let live = self.state.lock().live;
        for _ in 0..live {
            self.semaphore.post();
        }
        info!(pool = %self.name, live, wait, "pool stopping");

        if wait {
            loop {
                let remaining = {
                    let state = self.state.lock();
                    state.live + state.starting
                };
                if remaining == 0 {
                    break;
                }
                self.done.wait();
            }
            info!(pool = %self.name, "pool stopped");
        }
    }

    /// Whether the calling thread is one of this pool's workers.
    #[must_use]
    pub fn is_current_worker(&self) -> bool {
        WORKER_OF.with(|cell| cell.get() == Some(self.id))
    }

    /// Run everything queued so far, then stop every queue.
    ///
    /// Each running queue gets a shared sentinel through
    /// [`Queue::stop_after_if_running`]; the call returns once every sentinel has run.
    /// Queues already stopped are skipped since they would never reach it.
    pub fn flush(&self) {
        let flushed = Arc::new(Semaphore::new(0));
        let signal = Arc::clone(&flushed);
        let sentinel = Work::from_fn(move || signal.post());

        let mut expected = 0;
        for queue in self.queues() {
            if queue.stop_after_if_running(Arc::clone(&sentinel)) {
                expected += 1;
            }
        }

        debug!(pool = %self.name, queues = expected, "flushing");
        for _ in 0..expected {
            flushed.wait();
        }
        debug!(pool = %self.name, "flush complete");
    }

    /// Async variant of [`stop`](Self::stop) that blocks on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Internal`] if the blocking task fails to complete.
    #[cfg(feature = "tokio-runtime")]
    pub async fn stop_async(self: &Arc<Self>, wait: bool) -> Result<(), PoolError> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.stop(wait))
            .await
            .map_err(|e| PoolError::Internal(format!("stop task failed: {e}")))
    }

    /// Async variant of [`flush`](Self::flush) that blocks on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Internal`] if the blocking task fails to complete.
    #[cfg(feature = "tokio-runtime")]
    pub async fn flush_async(self: &Arc<Self>) -> Result<(), PoolError> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.flush())
            .await
            .map_err(|e| PoolError::Internal(format!("flush task failed: {e}")))
    }

    fn spawn_worker(self: &Arc<Self>) -> std::io::Result<()> {
        let worker_id = {
            let mut state = self.state.lock();
            state.spawned += 1;
            state.spawned
        };
        let pool = Arc::clone(self);
        thread::Builder::new()
            .name(format!("{}-worker-{worker_id}", self.name))
            .spawn(move || worker_main(&pool, worker_id))
            .map(drop)
    }

    /// Block for a signal, then find the next runnable unit round-robin.
    ///
    /// `cursor` is the calling worker's last visited queue index.
    fn next(&self, cursor: &mut usize) -> Option<(Arc<Queue>, Arc<Work>)> {
        self.semaphore.wait();
        if !self.is_running() {
            return None;
        }

        let queues = self.queues();
        let n = queues.len();
        for _ in 0..n {
            *cursor = cursor.wrapping_add(1) % n;
            let queue = &queues[*cursor];
            if let Some(work) = queue.next() {
                return Some((Arc::clone(queue), work));
            }
        }
        None
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("queues", &state.queues.len())
            .field("live", &state.live)
            .field("starting", &state.starting)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Worker thread body.
fn worker_main(pool: &Arc<Pool>, worker_id: usize) {
    {
        let mut state = pool.state.lock();
        state.starting -= 1;
        state.live += 1;
    }
    WORKER_OF.with(|cell| cell.set(Some(pool.id)));
    debug!(pool = %pool.name, worker_id, "worker thread started");

    // Start right after the last queue so the first scan begins at index 0.
    let mut cursor = usize::MAX;
    while pool.is_running() {
        let Some((queue, work)) = pool.next(&mut cursor) else {
            continue;
        };
        let result = {
            let _scope = pool.stats.begin();
            queue.run(work)
        };
        if let Err(err) = result {
            error!(
                pool = %pool.name,
                queue = %queue.name(),
                worker_id,
                error = %err,
                "work unit failed"
            );
        }
    }

    WORKER_OF.with(|cell| cell.set(None));
    pool.state.lock().live -= 1;
    debug!(pool = %pool.name, worker_id, "worker thread exiting");
    pool.done.post();
}
