// src/registry.rs

//! Canonical record of every submitted task and its lifecycle state.
//!
//! The registry is the single owner of status transitions; other components
//! read through it and ask it to transition. Terminal records are retained
//! up to a bounded window so that dependents and late `status()` queries can
//! still observe the outcome, then purged oldest-first.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::errors::{Result, SchedulerError};
use crate::task::{TaskRecord, TaskSpec, TaskView};
use crate::types::{FailureCause, TaskId, TaskStatus};

#[derive(Debug)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, TaskRecord>,
    /// Terminal task ids in the order they became terminal.
    terminal_order: VecDeque<TaskId>,
    /// Maximum number of terminal records to retain.
    retention: usize,
    arrival_counter: u64,
}

impl TaskRegistry {
    pub fn new(retention: usize) -> Self {
        Self {
            tasks: HashMap::new(),
            terminal_order: VecDeque::new(),
            retention: retention.max(1),
            arrival_counter: 0,
        }
    }

    /// Insert a new record, assigning its arrival sequence number.
    ///
    /// Fails if the identity is already present (terminal records still
    /// inside the retention window count as present).
    pub fn insert(&mut self, spec: TaskSpec) -> Result<u64> {
        if self.tasks.contains_key(&spec.id) {
            return Err(SchedulerError::DuplicateIdentity(spec.id));
        }
        let seq = self.arrival_counter;
        self.arrival_counter += 1;
        self.tasks
            .insert(spec.id.clone(), TaskRecord::new(spec, seq));
        Ok(seq)
    }

    /// Re-insert a record rebuilt from a recovery snapshot, preserving its
    /// retry count and re-assigning arrival order from record order.
    pub fn insert_recovered(&mut self, spec: TaskSpec, retry_count: u32) -> Result<u64> {
        let id = spec.id.clone();
        let seq = self.insert(spec)?;
        if let Some(rec) = self.tasks.get_mut(&id) {
            rec.retry_count = retry_count;
        }
        Ok(seq)
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.get(id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.tasks.get(id).map(|r| r.status)
    }

    pub fn view(&self, id: &str) -> Result<TaskView> {
        let rec = self
            .tasks
            .get(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
        Ok(TaskView {
            status: rec.status,
            failure_cause: rec.failure.clone(),
        })
    }

    /// Transition a task to a non-terminal status.
    pub fn set_status(&mut self, id: &str, status: TaskStatus) {
        debug_assert!(!status.is_terminal(), "use a terminal transition helper");
        if let Some(rec) = self.tasks.get_mut(id) {
            debug!(task = %id, from = %rec.status, to = %status, "status transition");
            rec.status = status;
        }
    }

    pub fn mark_completed(&mut self, id: &str) {
        self.mark_terminal(id, TaskStatus::Completed, None);
    }

    pub fn mark_failed(&mut self, id: &str, cause: FailureCause) {
        self.mark_terminal(id, TaskStatus::Failed, Some(cause));
    }

    pub fn mark_cancelled(&mut self, id: &str) {
        self.mark_terminal(id, TaskStatus::Cancelled, None);
    }

    fn mark_terminal(&mut self, id: &str, status: TaskStatus, cause: Option<FailureCause>) {
        if let Some(rec) = self.tasks.get_mut(id) {
            debug!(task = %id, from = %rec.status, to = %status, "terminal transition");
            rec.status = status;
            rec.failure = cause;
            self.terminal_order.push_back(id.to_string());
            self.purge_excess_terminal();
        }
    }

    /// Drop the oldest terminal records beyond the retention window.
    fn purge_excess_terminal(&mut self) {
        while self.terminal_order.len() > self.retention {
            if let Some(old) = self.terminal_order.pop_front() {
                debug!(task = %old, "purging terminal record past retention window");
                self.tasks.remove(&old);
            }
        }
    }

    pub fn increment_retry(&mut self, id: &str) -> u32 {
        match self.tasks.get_mut(id) {
            Some(rec) => {
                rec.retry_count += 1;
                rec.retry_count
            }
            None => 0,
        }
    }

    /// All non-terminal records in arrival order (snapshot source).
    pub fn non_terminal_records(&self) -> Vec<&TaskRecord> {
        let mut records: Vec<&TaskRecord> = self
            .tasks
            .values()
            .filter(|r| !r.status.is_terminal())
            .collect();
        records.sort_by_key(|r| r.arrival_seq);
        records
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(id: &str) -> TaskSpec {
        TaskSpec {
            id: id.to_string(),
            kind: "data_processing".to_string(),
            priority: 0,
            cost: 1,
            requires: BTreeMap::new(),
            after: vec![],
            payload: None,
            deadline_ms: None,
        }
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut reg = TaskRegistry::new(16);
        reg.insert(spec("a")).unwrap();
        assert!(matches!(
            reg.insert(spec("a")),
            Err(SchedulerError::DuplicateIdentity(_))
        ));
    }

    #[test]
    fn arrival_seq_is_monotonic() {
        let mut reg = TaskRegistry::new(16);
        assert_eq!(reg.insert(spec("a")).unwrap(), 0);
        assert_eq!(reg.insert(spec("b")).unwrap(), 1);
        assert_eq!(reg.insert(spec("c")).unwrap(), 2);
    }

    #[test]
    fn retention_purges_oldest_terminal_first() {
        let mut reg = TaskRegistry::new(2);
        for id in ["a", "b", "c"] {
            reg.insert(spec(id)).unwrap();
        }
        reg.mark_completed("a");
        reg.mark_completed("b");
        reg.mark_completed("c");

        assert!(matches!(
            reg.view("a"),
            Err(SchedulerError::UnknownTask(_))
        ));
        assert_eq!(reg.view("b").unwrap().status, TaskStatus::Completed);
        assert_eq!(reg.view("c").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn failure_cause_is_queryable() {
        let mut reg = TaskRegistry::new(16);
        reg.insert(spec("a")).unwrap();
        reg.mark_failed("a", FailureCause::Timeout);
        let view = reg.view("a").unwrap();
        assert_eq!(view.status, TaskStatus::Failed);
        assert_eq!(view.failure_cause, Some(FailureCause::Timeout));
    }
}
