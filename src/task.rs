// src/task.rs

//! Task submission payloads and registry records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{FailureCause, TaskId, TaskKind, TaskStatus};

/// Everything a caller provides when submitting a task.
///
/// `after` may reference identities that have not been submitted yet; such
/// dependencies simply count as unmet until the referenced task is submitted
/// and completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Lower value = more urgent.
    #[serde(default)]
    pub priority: i32,
    /// Positive size unit consumed by batch capacity.
    pub cost: u64,
    /// Named resource requirements held for the whole execution.
    #[serde(default)]
    pub requires: BTreeMap<String, u64>,
    /// Identities that must reach `Completed` before this task is Ready.
    #[serde(default)]
    pub after: Vec<TaskId>,
    /// Opaque payload reference owned by the caller.
    #[serde(default)]
    pub payload: Option<String>,
    /// Optional execution deadline in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Registry entry: the immutable spec plus lifecycle state.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub spec: TaskSpec,
    pub status: TaskStatus,
    pub retry_count: u32,
    /// Monotonic submission order, used as the FIFO tie-break.
    pub arrival_seq: u64,
    pub failure: Option<FailureCause>,
}

impl TaskRecord {
    pub fn new(spec: TaskSpec, arrival_seq: u64) -> Self {
        Self {
            spec,
            status: TaskStatus::Pending,
            retry_count: 0,
            arrival_seq,
            failure: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.spec.id
    }
}

/// Read-only answer to a `status(task_id)` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub status: TaskStatus,
    pub failure_cause: Option<FailureCause>,
}
