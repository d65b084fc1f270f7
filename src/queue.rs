// src/queue.rs

//! Ready queue: priority-ordered, FIFO within a priority level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::TaskId;

/// Heap entry carrying the explicit ordering key.
///
/// Ordered by (priority ASC, arrival_seq ASC); `Ord` is inverted so the
/// max-heap pops the most urgent, earliest-submitted entry first.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task: TaskId,
    pub priority: i32,
    pub arrival_seq: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.arrival_seq == other.arrival_seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower priority value first, then earlier arrival.
        match other.priority.cmp(&self.priority) {
            Ordering::Equal => other.arrival_seq.cmp(&self.arrival_seq),
            ord => ord,
        }
    }
}

/// Priority queue of Ready tasks.
///
/// Entries for tasks that have since been cancelled are skipped lazily on
/// pop by the scheduler core, which checks the registry status.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<QueueEntry>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, task: TaskId, priority: i32, arrival_seq: u64) {
        self.heap.push(QueueEntry {
            task,
            priority,
            arrival_seq,
        });
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
