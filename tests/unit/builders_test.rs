//! Tests for builder modules

use prometheus_task_runtime::builders::build_pool;
use prometheus_task_runtime::config::{PoolConfig, QueueConfig};
use prometheus_task_runtime::core::{PoolError, QueueError, Work};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_build_pool_registers_queues_in_order() {
    let config = PoolConfig::new("built")
        .with_num_threads(2)
        .with_queue(QueueConfig::new("first").with_max_concurrency(2))
        .with_queue(QueueConfig::new("second"));

    let built = build_pool(&config).unwrap();
    let names: Vec<String> = built.pool.queues().iter().map(|q| q.name().to_string()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(built.queue("first").unwrap().max_concurrency(), 2);
    assert_eq!(built.queue("second").unwrap().max_concurrency(), 1);
    assert!(built.queue("missing").is_none());
    built.pool.stop(true);
}

#[test]
fn test_build_pool_freezes_marked_queues() {
    let config = PoolConfig::new("frozen")
        .with_num_threads(1)
        .with_queue(QueueConfig::new("locked").frozen());

    let built = build_pool(&config).unwrap();
    let locked = built.queue("locked").unwrap();
    assert!(locked.is_frozen());
    assert!(matches!(
        locked.set_max_concurrency(3),
        Err(QueueError::Frozen { current: 1, requested: 3, .. })
    ));
    built.pool.stop(true);
}

#[test]
fn test_built_pool_runs_work() {
    let config = PoolConfig::new("working")
        .with_num_threads(2)
        .with_queue(QueueConfig::new("jobs").with_max_concurrency(2));
    let built = build_pool(&config).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let ran = Arc::clone(&ran);
        built.queue("jobs").unwrap().add_work(Work::from_fn(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        }));
    }
    built.pool.flush();
    assert_eq!(ran.load(Ordering::SeqCst), 10);
    built.pool.stop(true);
}

#[test]
fn test_build_pool_rejects_invalid_config() {
    let config = PoolConfig::new("bad")
        .with_num_threads(1)
        .with_queue(QueueConfig::new("dup"))
        .with_queue(QueueConfig::new("dup"));
    assert!(matches!(build_pool(&config), Err(PoolError::InvalidConfig(_))));

    let zero_threads = PoolConfig::new("idle").with_num_threads(0);
    assert!(matches!(build_pool(&zero_threads), Err(PoolError::InvalidConfig(_))));
}
