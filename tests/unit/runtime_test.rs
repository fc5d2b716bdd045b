//! Tests for the driving loop and compute executors

use std::fs;
use std::time::Duration;

use grid_client::core::{ClientError, ComputeExecutor, ErrorCode, WorkUnit};
use grid_client::runtime::{run, ShutdownFlag, ThreadCompute, TokioCompute};

use crate::mock::{Harness, InlineCompute, MockProxy};

fn write_outputs(workunit: &WorkUnit) -> grid_client::core::ClientResult<()> {
    for id in workunit.manifest.output_files() {
        if let Some(file) = workunit.manifest.file(id) {
            fs::write(workunit.file_path(file), b"done")?;
        }
    }
    Ok(())
}

/// Pump events until a report arrives, letting background compute catch up.
async fn pump_until_reported<C: ComputeExecutor>(h: &Harness<C>) -> bool {
    for _ in 0..500 {
        if !h.proxy.state().reports.is_empty() {
            return true;
        }
        if h.scheduler.has_events() {
            let _ = h.scheduler.handle_events().await;
        } else if let Some(at) = h.scheduler.next_event_time() {
            h.clock.set(at);
        } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_thread_compute_reports_finished() {
    let compute = ThreadCompute::spawn(write_outputs).unwrap();
    let h = Harness::new(1, MockProxy::new(), compute);

    assert!(pump_until_reported(&h).await);
    let state = h.proxy.state();
    assert!(!state.reports[0].failed);
    assert_eq!(state.uploads.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_thread_compute_failure_fails_work_unit() {
    let compute = ThreadCompute::spawn(|_wu: &WorkUnit| {
        Err(ClientError::error(ErrorCode::Internal, "science exploded"))
    })
    .unwrap();
    let h = Harness::new(1, MockProxy::new(), compute);

    assert!(pump_until_reported(&h).await);
    let state = h.proxy.state();
    assert!(state.reports[0].failed);
    assert!(state.uploads.is_empty());
}

#[test]
fn test_thread_compute_rejects_after_shutdown() {
    let compute = ThreadCompute::spawn(|_wu: &WorkUnit| Ok(())).unwrap();
    compute.shutdown();

    let h = Harness::new(1, MockProxy::new(), InlineCompute::default());
    let dir = tempfile::tempdir().unwrap();
    let wu = WorkUnit::create(0, dir.path(), 0).unwrap();
    let err = compute.compute(h.scheduler.handle(), wu).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_compute_reports_finished() {
    let compute = TokioCompute::current(|wu: WorkUnit| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        write_outputs(&wu)
    })
    .unwrap();
    let h = Harness::new(1, MockProxy::new(), compute);

    assert!(pump_until_reported(&h).await);
    assert!(!h.proxy.state().reports[0].failed);
}

#[test]
fn test_tokio_compute_needs_runtime() {
    let err = TokioCompute::current(|wu: WorkUnit| async move { write_outputs(&wu) }).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_shutdown_flag_is_shared() {
    let flag = ShutdownFlag::new();
    let other = flag.clone();
    assert!(!other.is_cancelled());
    flag.cancel();
    assert!(other.is_cancelled());
}

#[tokio::test]
async fn test_run_returns_when_already_cancelled() {
    let compute = ThreadCompute::spawn(write_outputs).unwrap();
    let h = Harness::new(1, MockProxy::new(), compute);
    let flag = ShutdownFlag::new();
    flag.cancel();

    run(&h.scheduler, &flag, Duration::from_millis(1)).await.unwrap();
    assert!(h.scheduler.has_events(), "recovery was not consumed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_drives_until_cancelled() {
    let compute = ThreadCompute::spawn(write_outputs).unwrap();
    let h = Harness::new(1, MockProxy::new(), compute);
    let flag = ShutdownFlag::new();

    let canceller = flag.clone();
    let proxy = h.proxy.clone();
    tokio::spawn(async move {
        for _ in 0..500 {
            if !proxy.state().reports.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        canceller.cancel();
    });

    run(&h.scheduler, &flag, Duration::from_millis(2)).await.unwrap();
    assert!(!h.proxy.state().reports.is_empty());
}
