// src/sched/step.rs

//! Structured result of a single scheduler step.

use crate::batch::ExecutionUnit;
use crate::types::TaskId;

/// What changed when the core processed an event.
///
/// Useful for tests that step the core manually and assert on exactly what
/// was dispatched or failed.
#[derive(Debug, Default)]
pub struct SchedStep {
    /// Units the shell must now hand to the worker pool.
    pub dispatched: Vec<ExecutionUnit>,
    /// Tasks newly marked terminal-Failed in this step (the failing members
    /// plus any dependents doomed by policy).
    pub newly_failed: Vec<TaskId>,
    /// Whether this step left the scheduler idle.
    pub became_idle: bool,
}
