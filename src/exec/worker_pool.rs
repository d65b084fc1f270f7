// src/exec/worker_pool.rs

//! Background pool loop with semaphore-bounded concurrency.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::info;

use crate::batch::ExecutionUnit;
use crate::engine::RuntimeEvent;
use crate::exec::unit_runner::run_unit;

/// Spawn the background pool loop.
///
/// The returned sender is what [`RealWorkerBackend`] forwards units into.
/// Each unit runs in its own Tokio task; a semaphore of `max_workers`
/// permits bounds how many run at once. The scheduler core accounts for the
/// same bound on its side, so in normal operation a unit never waits here,
/// but the semaphore keeps the bound honest regardless of who dispatches.
///
/// [`RealWorkerBackend`]: crate::exec::RealWorkerBackend
pub fn spawn_worker_pool(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    max_workers: usize,
    cost_unit_ms: u64,
) -> mpsc::Sender<ExecutionUnit> {
    let (tx, mut rx) = mpsc::channel::<ExecutionUnit>(64);

    tokio::spawn(async move {
        info!(max_workers, "worker pool started");
        let permits = Arc::new(Semaphore::new(max_workers.max(1)));

        while let Some(unit) = rx.recv().await {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed while the loop is alive.
                Err(_) => break,
            };
            let rt_tx = runtime_tx.clone();
            tokio::spawn(async move {
                run_unit(unit, cost_unit_ms, rt_tx).await;
                drop(permit);
            });
        }

        info!("worker pool finished (channel closed)");
    });

    tx
}
