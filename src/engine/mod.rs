// src/engine/mod.rs

//! Orchestration engine for batchdag.
//!
//! This module ties together:
//! - the scheduler core (admission, batching, dispatch accounting)
//! - the worker pool (unit execution)
//! - the main runtime event loop that reacts to:
//!   - API calls (submit / status / cancel) arriving over the channel
//!   - unit completion events from workers
//!   - shutdown signals
//!
//! The deterministic core lives in [`crate::sched`]; the async/IO shell is
//! implemented in [`runtime`]. [`SchedulerHandle`] is the cloneable API
//! surface external collaborators consume.

use tokio::sync::oneshot;

use crate::batch::UnitId;
use crate::errors::Result;
use crate::recovery::RecoveryLog;
use crate::task::{TaskSpec, TaskView};
use crate::types::TaskId;

pub use crate::types::UnitOutcome;

/// Runtime options used by the async shell.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once the scheduler is idle (used by the
    /// demo binary, which runs a finite workload).
    pub exit_when_idle: bool,
    /// Recovery log to persist to on shutdown/idle; `None` disables
    /// persistence.
    pub recovery: Option<RecoveryLog>,
}

/// Events flowing into the runtime from handles and workers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A caller wants to admit a task.
    Submit {
        spec: TaskSpec,
        reply: oneshot::Sender<Result<TaskId>>,
    },
    /// A caller wants to cancel a not-yet-dispatched task.
    Cancel {
        task: TaskId,
        reply: oneshot::Sender<Result<()>>,
    },
    /// A caller wants a task's current status.
    Status {
        task: TaskId,
        reply: oneshot::Sender<Result<TaskView>>,
    },
    /// A worker finished a unit with a concrete outcome.
    UnitFinished { unit: UnitId, outcome: UnitOutcome },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod handle;
pub mod runtime;

pub use handle::SchedulerHandle;
pub use runtime::Runtime;
