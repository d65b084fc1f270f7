// src/exec/backend.rs

//! Pluggable worker backend abstraction.
//!
//! - `RealWorkerBackend` is the default: it forwards units to the background
//!   pool loop in [`worker_pool`] over an mpsc channel.
//! - Tests can provide their own `WorkerBackend` that records which units
//!   were dispatched and directly emits `UnitFinished` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::batch::ExecutionUnit;
use crate::engine::RuntimeEvent;
use crate::errors::{Result, SchedulerError};

use super::worker_pool::spawn_worker_pool;

/// Trait abstracting how execution units are run.
pub trait WorkerBackend: Send {
    /// Hand the given units to workers.
    ///
    /// The implementation is free to:
    /// - run them on a bounded background pool (production)
    /// - simulate completion and emit `RuntimeEvent`s (tests)
    fn run_units(
        &mut self,
        units: Vec<ExecutionUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend wrapping the background pool loop.
pub struct RealWorkerBackend {
    tx: mpsc::Sender<ExecutionUnit>,
}

impl RealWorkerBackend {
    /// Create the backend, wiring it to the given runtime event sender.
    ///
    /// This spawns the background pool loop immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        max_workers: usize,
        cost_unit_ms: u64,
    ) -> Self {
        let tx = spawn_worker_pool(runtime_tx, max_workers, cost_unit_ms);
        Self { tx }
    }
}

impl WorkerBackend for RealWorkerBackend {
    fn run_units(
        &mut self,
        units: Vec<ExecutionUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for unit in units {
                tx.send(unit)
                    .await
                    .map_err(|_| SchedulerError::ShuttingDown)?;
            }
            Ok(())
        })
    }
}
