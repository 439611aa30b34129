//! Tests for error types

use prometheus_task_runtime::core::{AppResult, Outcome, PoolError, Queue, QueueError, Work, WorkError};
use prometheus_task_runtime::Semaphore;
use std::error::Error;
use std::sync::Arc;

#[test]
fn test_frozen_error() {
    let err = QueueError::Frozen {
        queue: "monitor".to_string(),
        current: 1,
        requested: 4,
    };
    assert_eq!(
        format!("{}", err),
        "queue `monitor` is frozen at concurrency 1, cannot set 4"
    );
}

#[test]
fn test_zero_concurrency_error() {
    let err = QueueError::ZeroConcurrency {
        queue: "uploads".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "queue `uploads` requires a concurrency limit greater than 0"
    );
}

#[test]
fn test_queue_error_is_transparent_in_pool_error() {
    let err: PoolError = QueueError::ZeroConcurrency {
        queue: "q".to_string(),
    }
    .into();
    assert_eq!(
        format!("{}", err),
        "queue `q` requires a concurrency limit greater than 0"
    );
}

#[test]
fn test_invalid_config_error() {
    let err = PoolError::InvalidConfig("num_threads must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: num_threads must be greater than 0"
    );
}

#[test]
fn test_spawn_error_keeps_source() {
    let err = PoolError::Spawn {
        pool: "io".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "no threads left"),
    };
    assert!(format!("{}", err).starts_with("pool `io` failed to spawn worker thread"));
    assert!(err.source().is_some());
}

#[test]
fn test_work_failed_shows_context_chain() {
    let inner = anyhow::anyhow!("disk full").context("writing thumbnail");
    let err = WorkError::Failed(inner);
    assert_eq!(format!("{}", err), "work failed: writing thumbnail: disk full");
}

#[test]
fn test_queue_create_rejects_zero_concurrency() {
    let err = Queue::create("zero", Arc::new(Semaphore::new(0)), 0, None).unwrap_err();
    assert!(matches!(err, QueueError::ZeroConcurrency { .. }));
}

fn parse_batch_size(input: &str) -> AppResult<usize> {
    Ok(input.trim().parse()?)
}

#[test]
fn test_app_result_errors_surface_as_work_failures() {
    let queue = Queue::create("parse", Arc::new(Semaphore::new(0)), 1, None).unwrap();
    queue.add_work(Work::create(None, || {
        parse_batch_size("twelve")?;
        Ok(Outcome::Done)
    }));

    let err = queue.run(queue.next().unwrap()).unwrap_err();
    assert!(matches!(err, WorkError::Failed(_)));
    assert!(format!("{}", err).contains("invalid digit"));
    assert_eq!(parse_batch_size(" 12 ").unwrap(), 12);
}
