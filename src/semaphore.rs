//! Counting semaphore.
//!
//! This module provides the blocking wait/signal primitive the runtime is built on.
//! A [`Pool`](crate::core::Pool) shares one instance between all of its queues as the
//! "work is available" signal, and the scheduler monitor owns a private one as its
//! wake-up mechanism.
//!
//! # Examples
//!
//! ```
//! use prometheus_task_runtime::Semaphore;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let sem = Arc::new(Semaphore::new(0));
//! let sem2 = Arc::clone(&sem);
//!
//! let handle = thread::spawn(move || {
//!     sem2.wait();
//! });
//!
//! sem.post();
//! handle.join().unwrap();
//! assert_eq!(sem.available(), 0);
//! ```

use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// A counting semaphore with a bounded timed-wait variant.
///
/// Unlike `std`'s primitives this type does not implement poisoning. No fairness is
/// guaranteed between blocked threads: a `post` wakes an arbitrary waiter.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `initial` tokens.
    ///
    /// # Examples
    ///
    /// ```
    /// use prometheus_task_runtime::Semaphore;
    ///
    /// let sem = Semaphore::new(2);
    /// assert_eq!(sem.available(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// Adds one token and wakes one blocked waiter, if any.
    #[inline]
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        drop(count);
        self.cond.notify_one();
    }

    /// Blocks the calling thread until a token is available, then takes it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    /// Blocks until a token is available or `deadline` passes, whichever comes first.
    ///
    /// Returns `true` when a token was taken. On timeout the count is left untouched
    /// and `false` is returned. A deadline already in the past degrades to
    /// [`try_wait`](Self::try_wait).
    ///
    /// # Examples
    ///
    /// ```
    /// use prometheus_task_runtime::Semaphore;
    /// use std::time::{Duration, Instant};
    ///
    /// let sem = Semaphore::new(0);
    /// let start = Instant::now();
    /// assert!(!sem.timed_wait(start + Duration::from_millis(20)));
    /// assert!(start.elapsed() >= Duration::from_millis(20));
    ///
    /// sem.post();
    /// assert!(sem.timed_wait(Instant::now() + Duration::from_secs(1)));
    /// ```
    pub fn timed_wait(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock();
        while *count == 0 {
            if self.cond.wait_until(&mut count, deadline).timed_out() {
                break;
            }
        }
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Takes a token if one is available without blocking.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Number of tokens currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}
