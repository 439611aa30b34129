//! Listener registry used for idle notifications.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use super::error::panic_message;

/// Handle returned by [`Listeners::add`], used to unregister a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync + 'static>;

/// Registry of callbacks invoked with a borrowed `A`.
///
/// [`notify`](Self::notify) copies the callback list and releases the registry lock
/// before invoking anything, so a callback may add or remove listeners, or call back
/// into whatever component fired it.
pub struct Listeners<A> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<A>)>>,
}

impl<A> Listeners<A> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback.
    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, Arc::new(callback)));
        id
    }

    /// Unregister a callback. Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke every registered callback with `arg`.
    ///
    /// A panicking callback is logged and skipped; the remaining callbacks still run.
    pub fn notify(&self, arg: &A) {
        let snapshot: Vec<Callback<A>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(arg))) {
                error!(panic = %panic_message(payload.as_ref()), "listener panicked");
            }
        }
    }
}

impl<A> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Listeners<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}
