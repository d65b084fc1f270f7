// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task identity type used throughout the scheduler.
pub type TaskId = String;

/// Task kind, discriminating batch compatibility (e.g. "data_processing",
/// "model_inference", "attention").
pub type TaskKind = String;

/// Lifecycle status of a submitted task.
///
/// Terminal states are `Completed`, `Failed` and `Cancelled`; everything
/// else is non-terminal and survives a persist/recover round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Registered but not yet classified as Blocked or Ready.
    Pending,
    /// Waiting on one or more dependencies.
    Blocked,
    /// All dependencies completed; eligible for the ready queue.
    Ready,
    /// Assigned to an execution unit (open buffer, or sealed and awaiting
    /// dispatch), not yet running.
    Batched,
    /// Dispatched to a worker; resources reserved.
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Ready => "ready",
            TaskStatus::Batched => "batched",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Why a task ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// The worker reported an execution error.
    Execution(String),
    /// The per-unit deadline elapsed before the worker finished.
    Timeout,
    /// A dependency failed (or was cancelled) and the dependent policy
    /// propagates failure.
    Upstream(TaskId),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Execution(msg) => write!(f, "execution error: {msg}"),
            FailureCause::Timeout => write!(f, "deadline exceeded"),
            FailureCause::Upstream(dep) => write!(f, "upstream task '{dep}' did not complete"),
        }
    }
}

/// Result of executing a unit, reported back by the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Completed,
    Failed(String),
    /// The unit's deadline elapsed before the worker finished.
    TimedOut,
}

/// What happens to dependents when a task fails (or is cancelled).
///
/// - `Fail`: dependents become `Failed` without executing, transitively.
/// - `Block`: dependents stay `Blocked` and are never auto-unblocked.
///
/// The policy is set once in configuration and applied uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependentPolicy {
    Fail,
    Block,
}

impl Default for DependentPolicy {
    fn default() -> Self {
        DependentPolicy::Fail
    }
}

impl FromStr for DependentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(DependentPolicy::Fail),
            "block" => Ok(DependentPolicy::Block),
            other => Err(format!(
                "invalid dependent_policy: {other} (expected \"fail\" or \"block\")"
            )),
        }
    }
}

/// How a failed batch is retried.
///
/// - `PerTask`: members are re-queued individually; they may be re-batched
///   differently on the next pass.
/// - `WholeBatch`: the sealed unit is retried intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchFailurePolicy {
    PerTask,
    WholeBatch,
}

impl Default for BatchFailurePolicy {
    fn default() -> Self {
        BatchFailurePolicy::PerTask
    }
}

impl FromStr for BatchFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-task" => Ok(BatchFailurePolicy::PerTask),
            "whole-batch" => Ok(BatchFailurePolicy::WholeBatch),
            other => Err(format!(
                "invalid batch_failure: {other} (expected \"per-task\" or \"whole-batch\")"
            )),
        }
    }
}
