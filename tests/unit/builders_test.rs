//! Tests for builder modules

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use grid_client::builders::SchedulerBuilder;
use grid_client::config::{Configuration, SchedulerConfig};
use grid_client::core::ErrorCode;
use grid_client::util::ManualClock;

use crate::mock::{InlineCompute, MockProxy};

#[test]
fn test_scheduler_builder_requires_all_parts() {
    let err = SchedulerBuilder::<MockProxy, InlineCompute>::new()
        .with_proxy(MockProxy::new())
        .with_compute(InlineCompute::default())
        .build()
        .err()
        .unwrap();
    assert!(err.is_fatal());
    assert!(err.message().contains("configuration"));

    let dir = tempfile::tempdir().unwrap();
    let err = SchedulerBuilder::<MockProxy, InlineCompute>::new()
        .with_configuration(Configuration::new(dir.path()).shared())
        .with_compute(InlineCompute::default())
        .build()
        .err()
        .unwrap();
    assert!(err.message().contains("proxy"));
}

#[test]
fn test_scheduler_builder_rejects_invalid_settings() {
    let dir = tempfile::tempdir().unwrap();
    let err = SchedulerBuilder::new()
        .with_settings(SchedulerConfig {
            slots: 3,
            ..SchedulerConfig::default()
        })
        .with_configuration(Configuration::new(dir.path()).shared())
        .with_proxy(MockProxy::new())
        .with_compute(InlineCompute::default())
        .build()
        .err()
        .unwrap();
    assert!(err.is_fatal());
    assert_eq!(err.code(), ErrorCode::Internal);
}

#[tokio::test]
async fn test_scheduler_builder_installs_clock_and_listener() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let scheduler = SchedulerBuilder::new()
        .with_settings(SchedulerConfig {
            slots: 1,
            ..SchedulerConfig::default()
        })
        .with_configuration(Configuration::new(dir.path()).shared())
        .with_proxy(MockProxy::new())
        .with_compute(InlineCompute::default())
        .with_clock(ManualClock::new(42))
        .with_listener(move |_slot: usize| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    assert_eq!(scheduler.settings().slots, 1);
    scheduler.handle_events().await.unwrap();
    assert_eq!(scheduler.next_event_time(), Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
