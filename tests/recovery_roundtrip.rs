// tests/recovery_roundtrip.rs
//
// Shutdown and restart: non-terminal state written by one scheduler
// instance is rebuilt by a fresh one, and the workload finishes there.

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;

use tokio::sync::mpsc;

use batchdag::config::SchedulerConfig;
use batchdag::engine::{Runtime, RuntimeEvent, RuntimeOptions, SchedulerHandle};
use batchdag::recovery::RecoveryLog;
use batchdag::resources::ResourceMap;
use batchdag::sched::SchedulerCore;
use batchdag::types::{TaskStatus, UnitOutcome};
use batchdag_test_utils::builders::TaskSpecBuilder;
use batchdag_test_utils::fake_worker::FakeWorker;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn snapshot_restores_into_a_fresh_scheduler() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let log = RecoveryLog::new(dir.path().join("sched.log"));

    let mut core = SchedulerCore::new(SchedulerConfig::default(), &ResourceMap::new());
    core.submit(TaskSpecBuilder::new("u").cost(5).build())?;
    core.submit(TaskSpecBuilder::new("d").after("u").cost(5).build())?;
    core.submit(TaskSpecBuilder::new("orphan").after("ghost").cost(5).build())?;

    // "u" is now running; "d" waits on it, "orphan" on a task that does
    // not exist yet.
    let units = core.pump();
    assert_eq!(units.len(), 1);

    log.persist(&core.snapshot())?;

    let mut fresh = SchedulerCore::new(SchedulerConfig::default(), &ResourceMap::new());
    fresh.restore(log.recover()?)?;

    // The interrupted "u" comes back Ready and runs again to completion.
    assert_eq!(fresh.status("u")?.status, TaskStatus::Ready);
    assert_eq!(fresh.status("d")?.status, TaskStatus::Blocked);
    assert_eq!(fresh.status("orphan")?.status, TaskStatus::Blocked);

    let units = fresh.pump();
    assert_eq!(units.len(), 1);
    let step = fresh.handle_unit_outcome(units[0].id, UnitOutcome::Completed);
    assert_eq!(step.dispatched.len(), 1);
    assert_eq!(step.dispatched[0].members, vec!["d".to_string()]);
    fresh.handle_unit_outcome(step.dispatched[0].id, UnitOutcome::Completed);

    assert_eq!(fresh.status("u")?.status, TaskStatus::Completed);
    assert_eq!(fresh.status("d")?.status, TaskStatus::Completed);
    // Still waiting on its ghost dependency; submitting it releases it.
    fresh.submit(TaskSpecBuilder::new("ghost").cost(1).build())?;
    let units = fresh.pump();
    assert_eq!(units[0].members, vec!["ghost".to_string()]);
    let step = fresh.handle_unit_outcome(units[0].id, UnitOutcome::Completed);
    assert_eq!(step.dispatched[0].members, vec!["orphan".to_string()]);
    Ok(())
}

#[tokio::test]
async fn graceful_shutdown_persists_non_terminal_tasks() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("sched.log");

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(32);
    let worker = FakeWorker::new(rt_tx.clone());
    let core = SchedulerCore::new(SchedulerConfig::default(), &ResourceMap::new());
    let options = RuntimeOptions {
        exit_when_idle: false,
        recovery: Some(RecoveryLog::new(&log_path)),
    };
    let runtime = tokio::spawn(Runtime::new(core, rt_rx, worker, options).run());
    let handle = SchedulerHandle::new(rt_tx);

    with_timeout(async {
        // Completes immediately.
        handle
            .submit(TaskSpecBuilder::new("done").cost(1).build())
            .await
            .unwrap();
        // Blocked forever during this run.
        handle
            .submit(TaskSpecBuilder::new("waiting").after("ghost").cost(1).build())
            .await
            .unwrap();

        handle.shutdown().await.unwrap();
    })
    .await;
    runtime.await??;

    // Only the non-terminal task survives in the log.
    let records = RecoveryLog::new(&log_path).recover()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task.id, "waiting");
    assert_eq!(records[0].status, TaskStatus::Blocked);
    assert_eq!(records[0].remaining_dependencies, vec!["ghost".to_string()]);

    // Restoring twice changes nothing.
    let mut fresh = SchedulerCore::new(SchedulerConfig::default(), &ResourceMap::new());
    fresh.restore(records.clone())?;
    fresh.restore(records)?;
    assert_eq!(fresh.status("waiting")?.status, TaskStatus::Blocked);
    assert!(fresh.status("done").is_err());
    Ok(())
}

#[tokio::test]
async fn submissions_after_shutdown_are_refused() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(32);
    let worker = FakeWorker::new(rt_tx.clone());
    let core = SchedulerCore::new(SchedulerConfig::default(), &ResourceMap::new());
    let runtime = tokio::spawn(
        Runtime::new(core, rt_rx, worker, RuntimeOptions::default()).run(),
    );
    let handle = SchedulerHandle::new(rt_tx);

    with_timeout(async {
        handle.shutdown().await.unwrap();
        // Either the core refuses it or the channel is already closed;
        // both surface as ShuttingDown.
        let err = handle
            .submit(TaskSpecBuilder::new("late").cost(1).build())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            batchdag::errors::SchedulerError::ShuttingDown
        ));
    })
    .await;
    runtime.await??;
    Ok(())
}
