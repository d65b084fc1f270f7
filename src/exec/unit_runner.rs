// src/exec/unit_runner.rs

//! Individual unit runner.
//!
//! Payload execution is simulated: the runner sleeps in proportion to the
//! unit's total cost (`cost_unit_ms` per cost unit). Real workloads would
//! replace this with actual inference or processing against the members'
//! payload references; everything around it (deadline handling, outcome
//! reporting) stays the same.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::batch::ExecutionUnit;
use crate::engine::RuntimeEvent;
use crate::types::UnitOutcome;

/// Run a single unit and report its outcome to the runtime.
///
/// If the unit carries a deadline and the work outlasts it, the outcome is
/// `TimedOut` and no completion is reported for the members.
pub async fn run_unit(
    unit: ExecutionUnit,
    cost_unit_ms: u64,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let work = Duration::from_millis(unit.total_cost.saturating_mul(cost_unit_ms));
    info!(
        unit = unit.id,
        kind = %unit.kind,
        members = unit.members.len(),
        work_ms = work.as_millis() as u64,
        "unit running"
    );

    let outcome = match unit.deadline {
        Some(deadline) => match tokio::time::timeout(deadline, tokio::time::sleep(work)).await {
            Ok(()) => UnitOutcome::Completed,
            Err(_) => UnitOutcome::TimedOut,
        },
        None => {
            tokio::time::sleep(work).await;
            UnitOutcome::Completed
        }
    };

    debug!(unit = unit.id, ?outcome, "unit finished");
    // A send error means the runtime is gone; nothing left to report to.
    let _ = runtime_tx
        .send(RuntimeEvent::UnitFinished {
            unit: unit.id,
            outcome,
        })
        .await;
}
