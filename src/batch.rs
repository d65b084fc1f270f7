// src/batch.rs

//! Selective batching: grouping ready, same-kind tasks under a size cap.
//!
//! The assembler keeps a single open buffer at a time. Offering a task
//! appends it when the buffer holds the same kind and the added cost still
//! fits under the capacity; otherwise the buffer is sealed and a new one is
//! opened starting with the offered task. Packing is strictly greedy,
//! first-fit in pop order: no reordering, so FIFO fairness within a kind is
//! preserved at the cost of packing efficiency.
//!
//! Non-batchable kinds never reach the assembler; the scheduler core
//! dispatches them as singleton units.

use std::time::Duration;

use tracing::debug;

use crate::resources::ResourceMap;
use crate::types::{TaskId, TaskKind};

/// Monotonic execution-unit identity, assigned at dispatch.
pub type UnitId = u64;

/// A single task or a sealed batch, treated atomically by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    pub id: UnitId,
    pub kind: TaskKind,
    /// Member task ids; exactly one for singleton units.
    pub members: Vec<TaskId>,
    /// True only for units assembled from a batchable kind's buffer.
    pub batched: bool,
    pub total_cost: u64,
    /// Aggregate requirements over all members.
    pub requirements: ResourceMap,
    /// Minimum of the members' deadlines, if any member has one.
    pub deadline: Option<Duration>,
}

impl ExecutionUnit {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// A sealed, homogeneous group emitted by the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedGroup {
    pub kind: TaskKind,
    pub members: Vec<TaskId>,
    pub total_cost: u64,
}

#[derive(Debug)]
struct OpenBuffer {
    kind: TaskKind,
    members: Vec<TaskId>,
    total_cost: u64,
}

/// Accumulates batchable tasks into size-bounded, same-kind groups.
#[derive(Debug)]
pub struct BatchAssembler {
    capacity: u64,
    open: Option<OpenBuffer>,
}

impl BatchAssembler {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity: capacity.max(1),
            open: None,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Offer a batchable task in pop order.
    ///
    /// Returns the buffer sealed by this offer, if any. The caller must
    /// ensure `cost <= capacity`; oversize tasks are dispatched as
    /// singletons and never offered.
    pub fn offer(&mut self, id: &TaskId, kind: &TaskKind, cost: u64) -> Option<SealedGroup> {
        debug_assert!(cost <= self.capacity);

        let sealed = match &mut self.open {
            Some(buffer) if buffer.kind == *kind && buffer.total_cost + cost <= self.capacity => {
                buffer.members.push(id.clone());
                buffer.total_cost += cost;
                return None;
            }
            Some(_) => self.seal(),
            None => None,
        };

        self.open = Some(OpenBuffer {
            kind: kind.clone(),
            members: vec![id.clone()],
            total_cost: cost,
        });
        sealed
    }

    /// Seal and emit the open buffer, if any. Called when the ready queue
    /// drains so a partial batch does not sit around waiting for peers.
    pub fn flush(&mut self) -> Option<SealedGroup> {
        self.seal()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_none()
    }

    fn seal(&mut self) -> Option<SealedGroup> {
        let buffer = self.open.take()?;
        debug!(
            kind = %buffer.kind,
            members = buffer.members.len(),
            total_cost = buffer.total_cost,
            "sealing batch"
        );
        Some(SealedGroup {
            kind: buffer.kind,
            members: buffer.members,
            total_cost: buffer.total_cost,
        })
    }
}
