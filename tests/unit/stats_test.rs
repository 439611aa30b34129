//! Tests for execution statistics

use prometheus_task_runtime::core::{Stats, StatsSnapshot, Work};
use std::time::Duration;

#[test]
fn test_new_stats_are_zero() {
    let stats = Stats::create("fresh");
    assert_eq!(stats.name(), "fresh");
    assert_eq!(stats.count(), 0);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.run_time(), Duration::ZERO);
}

#[test]
fn test_scope_counts_on_drop() {
    let stats = Stats::create("scoped");
    {
        let _scope = stats.begin();
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.count(), 0);
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.count(), 1);
    assert!(stats.run_time() >= Duration::from_millis(2));
}

#[test]
fn test_work_records_into_attached_stats() {
    let stats = Stats::create("work");
    let work = Work::create(Some(stats.clone()), || Ok(Default::default()));
    for _ in 0..3 {
        work.run().unwrap();
    }
    assert_eq!(stats.count(), 3);
    assert!(std::sync::Arc::ptr_eq(work.stats().unwrap(), &stats));
}

#[test]
fn test_failed_work_is_still_counted() {
    let stats = Stats::create("failing");
    let work = Work::create(Some(stats.clone()), || anyhow::bail!("nope"));
    assert!(work.run().is_err());
    assert_eq!(stats.count(), 1);
}

#[test]
fn test_snapshot_serializes() {
    let stats = Stats::create("snap");
    drop(stats.begin());
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.name, "snap");
    assert_eq!(snapshot.count, 1);
    assert_eq!(snapshot.active, 0);

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: StatsSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);
}
