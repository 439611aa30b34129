//! Pool, queue and scheduler configuration structures.

use std::collections::HashSet;
use std::env;

use serde::{Deserialize, Serialize};

/// Default ceiling on the scheduler monitor's sleep, in milliseconds.
pub const DEFAULT_MAX_SLEEP_MS: u64 = 30_000;

fn default_num_threads() -> usize {
    num_cpus::get().max(2)
}

const fn default_concurrency() -> usize {
    1
}

const fn default_max_sleep_ms() -> u64 {
    DEFAULT_MAX_SLEEP_MS
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String> {
    env_opt(key)
        .map(|v| v.parse().map_err(|_| format!("{key}: cannot parse `{v}`")))
        .transpose()
}

/// Load `.env` (silently ignored if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name, unique within its pool.
    pub name: String,
    /// Maximum units running at once.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    /// Freeze the concurrency limit right after creation.
    #[serde(default)]
    pub frozen: bool,
}

impl QueueConfig {
    /// Queue with concurrency 1, not frozen.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_concurrency: default_concurrency(),
            frozen: false,
        }
    }

    /// Set the concurrency limit.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Freeze the concurrency limit after creation.
    #[must_use]
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Validate queue configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("queue name must not be empty".into());
        }
        if self.max_concurrency == 0 {
            return Err(format!("queue `{}`: max_concurrency must be greater than 0", self.name));
        }
        Ok(())
    }
}

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool name, used for thread names and logs.
    pub name: String,
    /// Worker threads to start.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// Queues to register, in round-robin order.
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

impl PoolConfig {
    /// Pool with one thread per CPU (at least two) and no queues.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_threads: default_num_threads(),
            queues: Vec::new(),
        }
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Append a queue.
    #[must_use]
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queues.push(queue);
        self
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("pool name must not be empty".into());
        }
        if self.num_threads == 0 {
            return Err("num_threads must be greater than 0".into());
        }
        let mut seen = HashSet::new();
        for queue in &self.queues {
            queue
                .validate()
                .map_err(|e| format!("pool `{}` invalid: {e}", self.name))?;
            if !seen.insert(queue.name.as_str()) {
                return Err(format!("pool `{}` invalid: duplicate queue `{}`", self.name, queue.name));
            }
        }
        Ok(())
    }

    /// Parse pool configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build from `TASK_RUNTIME_POOL_NAME` and `TASK_RUNTIME_THREADS` after loading `.env`.
    ///
    /// Queues are not configurable from the environment.
    pub fn from_env() -> Result<Self, String> {
        load_dotenv();
        let mut cfg = Self::new(env_opt("TASK_RUNTIME_POOL_NAME").unwrap_or_else(|| "pool".into()));
        if let Some(threads) = env_parse("TASK_RUNTIME_THREADS")? {
            cfg.num_threads = threads;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler name, prefix of its pool and queue names.
    pub name: String,
    /// Worker threads; one is occupied by the monitor.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// Concurrency of the shared delivery queue. Unset means every thread but the
    /// monitor's, see [`shared_concurrency`](Self::shared_concurrency).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_queue_concurrency: Option<usize>,
    /// Longest the monitor sleeps without being woken, in milliseconds.
    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new("scheduler")
    }
}

impl SchedulerConfig {
    /// One thread per CPU (at least two), shared concurrency of all but the
    /// monitor's thread, 30 second sleep ceiling.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_threads: default_num_threads(),
            shared_queue_concurrency: None,
            max_sleep_ms: DEFAULT_MAX_SLEEP_MS,
        }
    }

    /// Effective shared queue concurrency: the configured value, otherwise
    /// `num_threads - 1` (at least 1).
    #[must_use]
    pub fn shared_concurrency(&self) -> usize {
        self.shared_queue_concurrency
            .unwrap_or_else(|| self.num_threads.saturating_sub(1).max(1))
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the shared queue concurrency.
    #[must_use]
    pub fn with_shared_queue_concurrency(mut self, concurrency: usize) -> Self {
        self.shared_queue_concurrency = Some(concurrency);
        self
    }

    /// Set the monitor sleep ceiling.
    #[must_use]
    pub fn with_max_sleep_ms(mut self, max_sleep_ms: u64) -> Self {
        self.max_sleep_ms = max_sleep_ms;
        self
    }

    /// Validate scheduler configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("scheduler name must not be empty".into());
        }
        if self.num_threads < 2 {
            return Err("num_threads must be at least 2 (one runs the monitor)".into());
        }
        if self.shared_queue_concurrency == Some(0) {
            return Err("shared_queue_concurrency must be greater than 0".into());
        }
        if self.max_sleep_ms == 0 {
            return Err("max_sleep_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build from `TASK_RUNTIME_SCHEDULER_NAME`, `TASK_RUNTIME_THREADS`,
    /// `TASK_RUNTIME_SHARED_CONCURRENCY` and `TASK_RUNTIME_MAX_SLEEP_MS` after
    /// loading `.env`.
    pub fn from_env() -> Result<Self, String> {
        load_dotenv();
        let mut cfg =
            Self::new(env_opt("TASK_RUNTIME_SCHEDULER_NAME").unwrap_or_else(|| "scheduler".into()));
        if let Some(threads) = env_parse("TASK_RUNTIME_THREADS")? {
            cfg.num_threads = threads;
        }
        cfg.shared_queue_concurrency = env_parse("TASK_RUNTIME_SHARED_CONCURRENCY")?;
        if let Some(max_sleep_ms) = env_parse("TASK_RUNTIME_MAX_SLEEP_MS")? {
            cfg.max_sleep_ms = max_sleep_ms;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
