// tests/runtime_fake_worker.rs
//
// Handle-driven runtime tests: a long-running runtime serves submit /
// status / cancel calls over the event channel while a fake worker
// completes (or fails) units instantly.

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use batchdag::config::SchedulerConfig;
use batchdag::engine::{Runtime, RuntimeEvent, RuntimeOptions, SchedulerHandle};
use batchdag::errors::SchedulerError;
use batchdag::resources::ResourceMap;
use batchdag::sched::SchedulerCore;
use batchdag::types::{FailureCause, TaskStatus};
use batchdag_test_utils::builders::TaskSpecBuilder;
use batchdag_test_utils::fake_worker::{FakeWorker, FakeWorkerProbe};

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    handle: SchedulerHandle,
    probe: FakeWorkerProbe,
    runtime: JoinHandle<batchdag::errors::Result<()>>,
}

/// Start a serving runtime (does not exit on idle) with a fake worker.
fn start(cfg: SchedulerConfig) -> Fixture {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(32);
    let worker = FakeWorker::new(rt_tx.clone());
    let probe = worker.probe();
    let core = SchedulerCore::new(cfg, &ResourceMap::new());
    let runtime = Runtime::new(core, rt_rx, worker, RuntimeOptions::default());
    let handle = SchedulerHandle::new(rt_tx);
    Fixture {
        handle,
        probe,
        runtime: tokio::spawn(runtime.run()),
    }
}

async fn wait_for_terminal(handle: &SchedulerHandle, id: &str) -> TaskStatus {
    loop {
        let view = handle.status(id).await.expect("status query failed");
        if view.status.is_terminal() {
            return view.status;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn chain_submitted_through_handle_runs_in_order() -> TestResult {
    init_tracing();
    let fixture = start(SchedulerConfig::default());
    let handle = &fixture.handle;

    with_timeout(async {
        handle
            .submit(TaskSpecBuilder::new("d").after("u").cost(5).build())
            .await
            .unwrap();
        handle
            .submit(TaskSpecBuilder::new("u").cost(5).build())
            .await
            .unwrap();

        assert_eq!(wait_for_terminal(handle, "u").await, TaskStatus::Completed);
        assert_eq!(wait_for_terminal(handle, "d").await, TaskStatus::Completed);
    })
    .await;

    assert_eq!(
        fixture.probe.executed_tasks(),
        vec!["u".to_string(), "d".to_string()]
    );

    fixture.handle.shutdown().await?;
    fixture.runtime.await??;
    Ok(())
}

#[tokio::test]
async fn duplicate_submission_is_rejected_over_the_handle() -> TestResult {
    init_tracing();
    let fixture = start(SchedulerConfig::default());
    let handle = &fixture.handle;

    with_timeout(async {
        handle
            .submit(TaskSpecBuilder::new("x").cost(1).build())
            .await
            .unwrap();
        let err = handle
            .submit(TaskSpecBuilder::new("x").cost(1).build())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateIdentity(_)));
    })
    .await;

    fixture.handle.shutdown().await?;
    fixture.runtime.await??;
    Ok(())
}

#[tokio::test]
async fn cancelled_blocked_task_never_runs() -> TestResult {
    init_tracing();
    let fixture = start(SchedulerConfig::default());
    let handle = &fixture.handle;

    with_timeout(async {
        // Blocked forever on an identity that is never submitted.
        handle
            .submit(TaskSpecBuilder::new("waiting").after("ghost").cost(1).build())
            .await
            .unwrap();
        assert_eq!(
            handle.status("waiting").await.unwrap().status,
            TaskStatus::Blocked
        );

        handle.cancel("waiting").await.unwrap();
        assert_eq!(
            handle.status("waiting").await.unwrap().status,
            TaskStatus::Cancelled
        );

        let err = handle.cancel("nobody").await.unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownTask(_)));
    })
    .await;

    assert!(fixture.probe.executed_tasks().is_empty());

    fixture.handle.shutdown().await?;
    fixture.runtime.await??;
    Ok(())
}

#[tokio::test]
async fn scripted_failure_is_retried_then_succeeds() -> TestResult {
    init_tracing();

    let cfg = SchedulerConfig {
        max_retries: 2,
        ..SchedulerConfig::default()
    };
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(32);
    let worker = FakeWorker::new(rt_tx.clone());
    worker.fail_times("flaky", 1);
    let probe = worker.probe();
    let core = SchedulerCore::new(cfg, &ResourceMap::new());
    let runtime = tokio::spawn(
        Runtime::new(core, rt_rx, worker, RuntimeOptions::default()).run(),
    );
    let handle = SchedulerHandle::new(rt_tx);

    with_timeout(async {
        handle
            .submit(TaskSpecBuilder::new("flaky").cost(1).build())
            .await
            .unwrap();
        assert_eq!(
            wait_for_terminal(&handle, "flaky").await,
            TaskStatus::Completed
        );
    })
    .await;

    // One failed attempt plus the successful retry.
    assert_eq!(probe.executed_tasks().len(), 2);

    handle.shutdown().await?;
    runtime.await??;
    Ok(())
}

#[tokio::test]
async fn retry_exhaustion_surfaces_the_execution_cause() -> TestResult {
    init_tracing();

    let cfg = SchedulerConfig {
        max_retries: 1,
        ..SchedulerConfig::default()
    };
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(32);
    let worker = FakeWorker::new(rt_tx.clone());
    worker.fail_times("doomed", 10);
    let core = SchedulerCore::new(cfg, &ResourceMap::new());
    let runtime = tokio::spawn(
        Runtime::new(core, rt_rx, worker, RuntimeOptions::default()).run(),
    );
    let handle = SchedulerHandle::new(rt_tx);

    with_timeout(async {
        handle
            .submit(TaskSpecBuilder::new("doomed").cost(1).build())
            .await
            .unwrap();
        handle
            .submit(TaskSpecBuilder::new("dependent").after("doomed").cost(1).build())
            .await
            .unwrap();

        assert_eq!(
            wait_for_terminal(&handle, "doomed").await,
            TaskStatus::Failed
        );
        let view = handle.status("doomed").await.unwrap();
        assert!(matches!(
            view.failure_cause,
            Some(FailureCause::Execution(_))
        ));

        // Default policy fails dependents with the upstream recorded.
        assert_eq!(
            wait_for_terminal(&handle, "dependent").await,
            TaskStatus::Failed
        );
        assert_eq!(
            handle.status("dependent").await.unwrap().failure_cause,
            Some(FailureCause::Upstream("doomed".to_string()))
        );
    })
    .await;

    handle.shutdown().await?;
    runtime.await??;
    Ok(())
}
