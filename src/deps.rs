// src/deps.rs

//! Dependency tracking over the task DAG.
//!
//! The tracker owns the forward map (task -> unmet dependency count) and the
//! reverse map (dependency -> dependent tasks). Dependencies may reference
//! identities that have not been submitted yet; those count as unmet until
//! the referenced task is submitted and completes. Cycles are rejected at
//! submission time with a petgraph toposort over the accumulated edge set,
//! so execution never has to deal with them.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::errors::{Result, SchedulerError};
use crate::types::{DependentPolicy, TaskId};

/// Outcome of registering a task's dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No unmet dependencies; the task can enter the ready queue.
    Ready,
    /// At least one dependency has not completed yet.
    Blocked,
}

#[derive(Debug)]
pub struct DependencyTracker {
    policy: DependentPolicy,
    /// task -> dependencies that have not completed yet.
    remaining: HashMap<TaskId, BTreeSet<TaskId>>,
    /// dependency -> tasks waiting on it (includes forward references).
    dependents: HashMap<TaskId, Vec<TaskId>>,
}

impl DependencyTracker {
    pub fn new(policy: DependentPolicy) -> Self {
        Self {
            policy,
            remaining: HashMap::new(),
            dependents: HashMap::new(),
        }
    }

    pub fn policy(&self) -> DependentPolicy {
        self.policy
    }

    /// Record a task's dependency edges.
    ///
    /// `is_completed` answers whether a referenced identity has already
    /// reached `Completed`; such dependencies are met immediately. Fails
    /// with `CyclicDependency` if the new edges would close a cycle; in
    /// that case no state is modified.
    pub fn register(
        &mut self,
        id: &TaskId,
        after: &[TaskId],
        is_completed: impl Fn(&str) -> bool,
    ) -> Result<Readiness> {
        for dep in after {
            if dep == id {
                return Err(SchedulerError::CyclicDependency(id.clone()));
            }
        }

        let unmet: BTreeSet<TaskId> = after
            .iter()
            .filter(|dep| !is_completed(dep))
            .cloned()
            .collect();

        self.check_acyclic(id, &unmet)?;

        for dep in &unmet {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(id.clone());
        }

        let readiness = if unmet.is_empty() {
            Readiness::Ready
        } else {
            debug!(task = %id, unmet = unmet.len(), "task blocked on dependencies");
            Readiness::Blocked
        };
        self.remaining.insert(id.clone(), unmet);
        Ok(readiness)
    }

    /// Toposort the accumulated unmet-edge set plus the candidate's edges.
    fn check_acyclic(&self, id: &TaskId, new_deps: &BTreeSet<TaskId>) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        // Edge direction: dependency -> dependent.
        for (task, deps) in &self.remaining {
            graph.add_node(task.as_str());
            for dep in deps {
                graph.add_edge(dep.as_str(), task.as_str(), ());
            }
        }
        graph.add_node(id.as_str());
        for dep in new_deps {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(_cycle) => Err(SchedulerError::CyclicDependency(id.clone())),
        }
    }

    /// A task completed: decrement its dependents' unmet sets and return the
    /// tasks whose last dependency this was.
    pub fn on_completed(&mut self, id: &str) -> Vec<TaskId> {
        self.remaining.remove(id);

        let mut newly_ready = Vec::new();
        if let Some(waiters) = self.dependents.remove(id) {
            for waiter in waiters {
                if let Some(unmet) = self.remaining.get_mut(&waiter) {
                    unmet.remove(id);
                    if unmet.is_empty() {
                        newly_ready.push(waiter);
                    }
                }
            }
        }
        newly_ready
    }

    /// A task failed (or was cancelled): apply the dependent policy.
    ///
    /// Under `DependentPolicy::Fail`, returns `(dependent, upstream)` pairs
    /// for every transitively affected dependent, where `upstream` is the
    /// direct dependency that doomed it. Under `Block`, returns nothing and
    /// dependents stay blocked for good.
    pub fn on_not_completed(&mut self, id: &str) -> Vec<(TaskId, TaskId)> {
        self.remaining.remove(id);

        match self.policy {
            DependentPolicy::Block => {
                if self
                    .dependents
                    .get(id)
                    .is_some_and(|waiters| !waiters.is_empty())
                {
                    warn!(
                        task = %id,
                        "task did not complete; dependents remain blocked (policy=block)"
                    );
                }
                Vec::new()
            }
            DependentPolicy::Fail => {
                let mut doomed = Vec::new();
                let mut stack: Vec<TaskId> = vec![id.to_string()];

                while let Some(upstream) = stack.pop() {
                    if let Some(waiters) = self.dependents.remove(&upstream) {
                        for waiter in waiters {
                            if self.remaining.remove(&waiter).is_some() {
                                debug!(
                                    task = %waiter,
                                    upstream = %upstream,
                                    "failing dependent due to upstream outcome"
                                );
                                doomed.push((waiter.clone(), upstream.clone()));
                                stack.push(waiter);
                            }
                        }
                    }
                }
                doomed
            }
        }
    }

    /// Drop a task's own edges (used when it is cancelled before running).
    pub fn remove(&mut self, id: &str) {
        if let Some(deps) = self.remaining.remove(id) {
            for dep in deps {
                if let Some(waiters) = self.dependents.get_mut(&dep) {
                    waiters.retain(|w| w != id);
                }
            }
        }
    }

    /// Remaining (unmet) dependencies of a task, for snapshots.
    pub fn remaining_of(&self, id: &str) -> Vec<TaskId> {
        self.remaining
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> DependencyTracker {
        DependencyTracker::new(DependentPolicy::Fail)
    }

    #[test]
    fn no_deps_is_ready() {
        let mut t = tracker();
        let r = t
            .register(&"a".to_string(), &[], |_| false)
            .unwrap();
        assert_eq!(r, Readiness::Ready);
    }

    #[test]
    fn forward_reference_blocks_until_completion() {
        let mut t = tracker();
        // "d" depends on "u", which has not been submitted yet.
        let r = t
            .register(&"d".to_string(), &["u".to_string()], |_| false)
            .unwrap();
        assert_eq!(r, Readiness::Blocked);

        let r = t.register(&"u".to_string(), &[], |_| false).unwrap();
        assert_eq!(r, Readiness::Ready);

        let ready = t.on_completed("u");
        assert_eq!(ready, vec!["d".to_string()]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut t = tracker();
        let err = t
            .register(&"a".to_string(), &["a".to_string()], |_| false)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::CyclicDependency(_)));
    }

    #[test]
    fn forward_cycle_is_rejected_at_submission() {
        let mut t = tracker();
        // a waits on b (forward reference), then b tries to wait on a.
        t.register(&"a".to_string(), &["b".to_string()], |_| false)
            .unwrap();
        let err = t
            .register(&"b".to_string(), &["a".to_string()], |_| false)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::CyclicDependency(_)));

        // The failed registration must not leave edges behind.
        let r = t.register(&"b".to_string(), &[], |_| false).unwrap();
        assert_eq!(r, Readiness::Ready);
        assert_eq!(t.on_completed("b"), vec!["a".to_string()]);
    }

    #[test]
    fn completed_dependency_counts_as_met() {
        let mut t = tracker();
        let r = t
            .register(&"x".to_string(), &["done".to_string()], |id| id == "done")
            .unwrap();
        assert_eq!(r, Readiness::Ready);
    }

    #[test]
    fn failure_cascades_transitively_under_fail_policy() {
        let mut t = tracker();
        t.register(&"a".to_string(), &[], |_| false).unwrap();
        t.register(&"b".to_string(), &["a".to_string()], |_| false)
            .unwrap();
        t.register(&"c".to_string(), &["b".to_string()], |_| false)
            .unwrap();

        let mut doomed = t.on_not_completed("a");
        doomed.sort();
        assert_eq!(
            doomed,
            vec![
                ("b".to_string(), "a".to_string()),
                ("c".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn block_policy_leaves_dependents_alone() {
        let mut t = DependencyTracker::new(DependentPolicy::Block);
        t.register(&"a".to_string(), &[], |_| false).unwrap();
        t.register(&"b".to_string(), &["a".to_string()], |_| false)
            .unwrap();

        assert!(t.on_not_completed("a").is_empty());
        // "b" still has an unmet dependency and will never be released.
        assert_eq!(t.remaining_of("b"), vec!["a".to_string()]);
    }
}
