//! Build a pool and its queues from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::PoolConfig;
use crate::core::{Pool, PoolError, Queue};

/// A pool together with the queues created for it, keyed by queue name.
#[derive(Debug)]
pub struct BuiltPool {
    /// The running pool.
    pub pool: Arc<Pool>,
    /// Registered queues by name.
    pub queues: HashMap<String, Arc<Queue>>,
}

impl BuiltPool {
    /// Look up a configured queue.
    #[must_use]
    pub fn queue(&self, name: &str) -> Option<&Arc<Queue>> {
        self.queues.get(name)
    }
}

/// Validate `cfg`, start the pool and register every configured queue in order.
///
/// Queues marked `frozen` are frozen right after creation. If a queue cannot be
/// created the pool is stopped before the error is returned.
///
/// # Errors
///
/// - [`PoolError::InvalidConfig`] if `cfg` fails validation
/// - [`PoolError::Spawn`] if a worker thread cannot be started
/// - [`PoolError::Queue`] if a queue cannot be created
pub fn build_pool(cfg: &PoolConfig) -> Result<BuiltPool, PoolError> {
    cfg.validate().map_err(PoolError::InvalidConfig)?;

    let pool = Pool::create(cfg.name.clone(), cfg.num_threads, None)?;
    let mut queues = HashMap::with_capacity(cfg.queues.len());
    for queue_cfg in &cfg.queues {
        let queue = match pool.add_queue(queue_cfg.name.clone(), queue_cfg.max_concurrency, None) {
            Ok(queue) => queue,
            Err(err) => {
                pool.stop(false);
                return Err(err);
            }
        };
        if queue_cfg.frozen {
            queue.freeze();
        }
        queues.insert(queue_cfg.name.clone(), queue);
    }

    info!(pool = %cfg.name, queues = queues.len(), "pool built from configuration");
    Ok(BuiltPool { pool, queues })
}
