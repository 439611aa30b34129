//! Tests for configuration validation

use prometheus_task_runtime::config::{PoolConfig, QueueConfig, SchedulerConfig, DEFAULT_MAX_SLEEP_MS};

#[test]
fn test_queue_config_validation() {
    assert!(QueueConfig::new("q").validate().is_ok());
    assert!(QueueConfig::new("q").with_max_concurrency(0).validate().is_err());
    assert!(QueueConfig::new("").validate().is_err());
}

#[test]
fn test_pool_config_validation() {
    let valid = PoolConfig::new("pool1")
        .with_num_threads(4)
        .with_queue(QueueConfig::new("a"))
        .with_queue(QueueConfig::new("b").with_max_concurrency(3));
    assert!(valid.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_threads() {
    let invalid = PoolConfig::new("pool1").with_num_threads(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_queue() {
    let invalid = PoolConfig::new("pool1").with_queue(QueueConfig::new("a").with_max_concurrency(0));
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("pool1"));
}

#[test]
fn test_pool_config_duplicate_queue() {
    let invalid = PoolConfig::new("pool1")
        .with_queue(QueueConfig::new("a"))
        .with_queue(QueueConfig::new("a"));
    assert!(invalid.validate().unwrap_err().contains("duplicate"));
}

#[test]
fn test_pool_config_from_json() {
    let json = r#"{
        "name": "io",
        "num_threads": 3,
        "queues": [
            {"name": "uploads", "max_concurrency": 2},
            {"name": "monitor", "frozen": true}
        ]
    }"#;
    let cfg = PoolConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.name, "io");
    assert_eq!(cfg.num_threads, 3);
    assert_eq!(cfg.queues.len(), 2);
    assert_eq!(cfg.queues[0].max_concurrency, 2);
    assert_eq!(cfg.queues[1].max_concurrency, 1);
    assert!(cfg.queues[1].frozen);
}

#[test]
fn test_pool_config_from_json_rejects_invalid() {
    assert!(PoolConfig::from_json_str(r#"{"name": "io", "num_threads": 0}"#).is_err());
    assert!(PoolConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig::new("timers").with_num_threads(2).with_shared_queue_concurrency(1);
    assert!(valid.validate().is_ok());

    assert!(SchedulerConfig::new("t").with_num_threads(1).validate().is_err());
    assert!(SchedulerConfig::new("t")
        .with_num_threads(2)
        .with_shared_queue_concurrency(0)
        .validate()
        .is_err());
    assert!(SchedulerConfig::new("t").with_num_threads(2).with_max_sleep_ms(0).validate().is_err());
    assert!(SchedulerConfig::new("").validate().is_err());
}

#[test]
fn test_scheduler_config_round_trips_through_json() {
    let cfg = SchedulerConfig::new("timers")
        .with_num_threads(4)
        .with_shared_queue_concurrency(2)
        .with_max_sleep_ms(500);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_scheduler_config_default_sleep() {
    let cfg = SchedulerConfig::from_json_str(r#"{"name": "timers", "num_threads": 2}"#).unwrap();
    assert_eq!(cfg.max_sleep_ms, DEFAULT_MAX_SLEEP_MS);
}
