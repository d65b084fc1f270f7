// src/sched/core.rs

//! Deterministic scheduler state machine.
//!
//! `SchedulerCore` owns the task registry, dependency tracker, resource
//! ledger, ready queue, batch assembler, deferred list, and in-flight table.
//! It is synchronous and performs no IO; the async shell calls into it and
//! carries out the dispatches it returns.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::{BatchAssembler, ExecutionUnit, SealedGroup, UnitId};
use crate::config::SchedulerConfig;
use crate::deps::{DependencyTracker, Readiness};
use crate::errors::{Result, SchedulerError};
use crate::queue::ReadyQueue;
use crate::recovery::RecoveryRecord;
use crate::registry::TaskRegistry;
use crate::resources::{ResourceLedger, ResourceMap};
use crate::sched::step::SchedStep;
use crate::task::{TaskSpec, TaskView};
use crate::types::{BatchFailurePolicy, FailureCause, TaskId, TaskStatus, UnitOutcome};

#[derive(Debug)]
pub struct SchedulerCore {
    cfg: SchedulerConfig,
    registry: TaskRegistry,
    deps: DependencyTracker,
    ledger: ResourceLedger,
    ready: ReadyQueue,
    assembler: BatchAssembler,
    /// Sealed units that could not dispatch yet, in seal order. Re-evaluated
    /// front-to-back on every pump.
    deferred: VecDeque<ExecutionUnit>,
    in_flight: HashMap<UnitId, ExecutionUnit>,
    next_unit_id: UnitId,
    shutting_down: bool,
}

impl SchedulerCore {
    pub fn new(cfg: SchedulerConfig, resources: &ResourceMap) -> Self {
        let assembler = BatchAssembler::new(cfg.max_batch_capacity);
        let registry = TaskRegistry::new(cfg.retention);
        let deps = DependencyTracker::new(cfg.dependent_policy);
        Self {
            cfg,
            registry,
            deps,
            ledger: ResourceLedger::new(resources),
            ready: ReadyQueue::new(),
            assembler,
            deferred: VecDeque::new(),
            in_flight: HashMap::new(),
            next_unit_id: 0,
            shutting_down: false,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Nothing queued, buffered, deferred, or running.
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty()
            && self.assembler.is_empty()
            && self.deferred.is_empty()
            && self.in_flight.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn begin_shutdown(&mut self) {
        info!("shutdown requested; admissions closed");
        self.shutting_down = true;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Admit a task.
    ///
    /// All admission checks run before any state is modified, so a rejected
    /// submission leaves the scheduler exactly as it was.
    pub fn submit(&mut self, spec: TaskSpec) -> Result<TaskId> {
        if self.shutting_down {
            return Err(SchedulerError::ShuttingDown);
        }
        if self.registry.get(&spec.id).is_some() {
            return Err(SchedulerError::DuplicateIdentity(spec.id));
        }
        if spec.cost == 0 {
            return Err(SchedulerError::InvalidResourceSpec {
                task: spec.id,
                reason: "cost must be positive".to_string(),
            });
        }
        self.ledger.validate_requirements(&spec.id, &spec.requires)?;

        let registry = &self.registry;
        let readiness = self.deps.register(&spec.id, &spec.after, |dep| {
            registry.status_of(dep) == Some(TaskStatus::Completed)
        })?;

        let id = spec.id.clone();
        let priority = spec.priority;
        let seq = self.registry.insert(spec)?;

        match readiness {
            Readiness::Ready => {
                self.registry.set_status(&id, TaskStatus::Ready);
                self.ready.push(id.clone(), priority, seq);
            }
            Readiness::Blocked => self.registry.set_status(&id, TaskStatus::Blocked),
        }
        info!(task = %id, "task admitted");
        Ok(id)
    }

    pub fn status(&self, id: &str) -> Result<TaskView> {
        self.registry.view(id)
    }

    /// Cancel a task that has not been assigned to an execution unit yet.
    ///
    /// Dependents of a cancelled task are treated exactly as dependents of a
    /// failed one, per the configured dependent policy.
    pub fn cancel(&mut self, id: &str) -> Result<SchedStep> {
        let status = self
            .registry
            .status_of(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;

        match status {
            TaskStatus::Pending | TaskStatus::Blocked | TaskStatus::Ready => {
                // A stale ready-queue entry may remain; it is skipped on pop.
                self.deps.remove(id);
                self.registry.mark_cancelled(id);
                info!(task = %id, "task cancelled");

                let mut step = SchedStep::default();
                for (dependent, upstream) in self.deps.on_not_completed(id) {
                    self.registry
                        .mark_failed(&dependent, FailureCause::Upstream(upstream));
                    step.newly_failed.push(dependent);
                }
                step.became_idle = self.is_idle();
                Ok(step)
            }
            other => Err(SchedulerError::NotCancellable {
                task: id.to_string(),
                status: other.to_string(),
            }),
        }
    }

    /// Drive scheduling forward: retry deferred units, then drain the ready
    /// queue through the assembler, dispatching whatever fits.
    ///
    /// Returns the units the caller must hand to the worker pool.
    pub fn pump(&mut self) -> Vec<ExecutionUnit> {
        // During shutdown nothing new is dispatched; in-flight units drain
        // and everything else is left for the recovery snapshot.
        if self.shutting_down {
            return Vec::new();
        }
        let mut dispatched = Vec::new();
        self.pump_deferred(&mut dispatched);

        while let Some(entry) = self.ready.pop() {
            // Lazy skip of entries whose task was cancelled since push.
            if self.registry.status_of(&entry.task) != Some(TaskStatus::Ready) {
                debug!(task = %entry.task, "skipping stale ready entry");
                continue;
            }
            let Some(spec) = self.registry.get(&entry.task).map(|r| r.spec.clone()) else {
                continue;
            };

            if self.cfg.is_batchable(&spec.kind) && spec.cost <= self.assembler.capacity() {
                self.registry.set_status(&spec.id, TaskStatus::Batched);
                if let Some(group) = self.assembler.offer(&spec.id, &spec.kind, spec.cost) {
                    let unit = self.unit_from_group(group, true);
                    self.try_dispatch(unit, &mut dispatched);
                }
            } else {
                // Seal any open buffer first so dispatch order follows pop
                // order, then emit the task as a singleton unit.
                if let Some(group) = self.assembler.flush() {
                    let unit = self.unit_from_group(group, true);
                    self.try_dispatch(unit, &mut dispatched);
                }
                self.registry.set_status(&spec.id, TaskStatus::Batched);
                let unit = self.singleton_unit(&spec);
                self.try_dispatch(unit, &mut dispatched);
            }
        }

        // The queue drained; a partial batch must not wait for peers that
        // may never come.
        if let Some(group) = self.assembler.flush() {
            let unit = self.unit_from_group(group, true);
            self.try_dispatch(unit, &mut dispatched);
        }
        dispatched
    }

    /// Process a unit outcome from the worker pool and pump once.
    pub fn handle_unit_outcome(&mut self, unit_id: UnitId, outcome: UnitOutcome) -> SchedStep {
        let Some(unit) = self.in_flight.remove(&unit_id) else {
            warn!(unit = unit_id, "outcome for unknown unit, dropping");
            return SchedStep {
                became_idle: self.is_idle(),
                ..SchedStep::default()
            };
        };
        self.ledger.release(&unit.requirements);

        let mut step = SchedStep::default();
        match outcome {
            UnitOutcome::Completed => {
                debug!(unit = unit_id, members = unit.members.len(), "unit completed");
                for member in &unit.members {
                    self.registry.mark_completed(member);
                    for ready_id in self.deps.on_completed(member) {
                        self.promote_to_ready(&ready_id);
                    }
                }
            }
            UnitOutcome::Failed(ref msg) => {
                warn!(unit = unit_id, error = %msg, "unit failed");
                self.resolve_failed_unit(unit, FailureCause::Execution(msg.clone()), &mut step);
            }
            UnitOutcome::TimedOut => {
                warn!(unit = unit_id, "unit deadline exceeded");
                self.resolve_failed_unit(unit, FailureCause::Timeout, &mut step);
            }
        }

        step.dispatched = self.pump();
        step.became_idle = self.is_idle();
        step
    }

    /// Snapshot of every non-terminal task, in arrival order.
    pub fn snapshot(&self) -> Vec<RecoveryRecord> {
        self.registry
            .non_terminal_records()
            .into_iter()
            .map(|rec| RecoveryRecord {
                task: rec.spec.clone(),
                status: rec.status,
                remaining_dependencies: self.deps.remaining_of(rec.id()),
                retry_count: rec.retry_count,
            })
            .collect()
    }

    /// Rebuild scheduler state from recovered records.
    ///
    /// Tasks snapshotted as Running or Batched come back as Ready: in-flight
    /// work is never assumed completed, and no reservation survives a
    /// restart. Records whose identity is already present are skipped, which
    /// makes restoring the same snapshot twice a no-op.
    pub fn restore(&mut self, records: Vec<RecoveryRecord>) -> Result<()> {
        self.ledger.reset();
        for record in records {
            let id = record.task.id.clone();
            if self.registry.get(&id).is_some() {
                debug!(task = %id, "skipping already-present task during restore");
                continue;
            }

            let registry = &self.registry;
            let readiness = self
                .deps
                .register(&id, &record.remaining_dependencies, |dep| {
                    registry.status_of(dep) == Some(TaskStatus::Completed)
                })?;
            let priority = record.task.priority;
            let seq = self
                .registry
                .insert_recovered(record.task, record.retry_count)?;

            match readiness {
                Readiness::Ready => {
                    self.registry.set_status(&id, TaskStatus::Ready);
                    self.ready.push(id.clone(), priority, seq);
                }
                Readiness::Blocked => self.registry.set_status(&id, TaskStatus::Blocked),
            }
            debug!(task = %id, "task restored");
        }
        Ok(())
    }

    fn promote_to_ready(&mut self, id: &str) {
        if let Some(rec) = self.registry.get(id) {
            let (priority, seq) = (rec.spec.priority, rec.arrival_seq);
            self.registry.set_status(id, TaskStatus::Ready);
            self.ready.push(id.to_string(), priority, seq);
        }
    }

    fn resolve_failed_unit(
        &mut self,
        unit: ExecutionUnit,
        cause: FailureCause,
        step: &mut SchedStep,
    ) {
        let per_task =
            !unit.batched || unit.members.len() == 1 || self.cfg.batch_failure == BatchFailurePolicy::PerTask;

        if per_task {
            for member in &unit.members {
                let retries = self.registry.increment_retry(member);
                if retries <= self.cfg.max_retries {
                    debug!(task = %member, attempt = retries, "re-queueing for retry");
                    self.promote_to_ready(member);
                } else {
                    self.fail_task(member, cause.clone(), step);
                }
            }
            return;
        }

        // Whole-batch retry: the unit goes back to the deferred list intact.
        // Once any member runs out of retries the entire batch fails.
        let exhausted = unit.members.iter().any(|member| {
            self.registry
                .get(member)
                .is_some_and(|r| r.retry_count + 1 > self.cfg.max_retries)
        });
        if exhausted {
            for member in &unit.members {
                self.registry.increment_retry(member);
                self.fail_task(member, cause.clone(), step);
            }
        } else {
            for member in &unit.members {
                self.registry.increment_retry(member);
                self.registry.set_status(member, TaskStatus::Batched);
            }
            debug!(unit = unit.id, "re-deferring whole batch for retry");
            self.deferred.push_back(unit);
        }
    }

    fn fail_task(&mut self, id: &str, cause: FailureCause, step: &mut SchedStep) {
        self.registry.mark_failed(id, cause);
        step.newly_failed.push(id.to_string());
        for (dependent, upstream) in self.deps.on_not_completed(id) {
            self.registry
                .mark_failed(&dependent, FailureCause::Upstream(upstream));
            step.newly_failed.push(dependent);
        }
    }

    fn pump_deferred(&mut self, dispatched: &mut Vec<ExecutionUnit>) {
        let mut still_deferred = VecDeque::new();
        while let Some(unit) = self.deferred.pop_front() {
            match self.dispatch(unit) {
                Ok(unit) => dispatched.push(unit),
                Err((unit, _)) => still_deferred.push_back(unit),
            }
        }
        self.deferred = still_deferred;
    }

    fn try_dispatch(&mut self, unit: ExecutionUnit, dispatched: &mut Vec<ExecutionUnit>) {
        // A batch can aggregate requirements beyond a counter's total even
        // though each member alone is admissible. Such a unit would defer
        // forever; split it back into singletons instead.
        if unit.batched && unit.members.len() > 1 && !self.ledger.ever_admissible(&unit.requirements)
        {
            warn!(
                unit = unit.id,
                "aggregate batch requirement exceeds total capacity, splitting"
            );
            let specs: Vec<TaskSpec> = unit
                .members
                .iter()
                .filter_map(|m| self.registry.get(m).map(|r| r.spec.clone()))
                .collect();
            for spec in specs {
                let singleton = self.singleton_unit(&spec);
                self.try_dispatch(singleton, dispatched);
            }
            return;
        }

        match self.dispatch(unit) {
            Ok(unit) => dispatched.push(unit),
            Err((unit, err)) => {
                debug!(unit = unit.id, reason = %err, "deferring unit");
                self.deferred.push_back(unit);
            }
        }
    }

    /// Dispatch when a worker slot is free and resources reserve; otherwise
    /// hand the unit back with the reason.
    fn dispatch(
        &mut self,
        unit: ExecutionUnit,
    ) -> std::result::Result<ExecutionUnit, (ExecutionUnit, SchedulerError)> {
        if self.in_flight.len() >= self.cfg.max_workers {
            return Err((unit, SchedulerError::CapacityExceeded));
        }
        if let Err(err) = self.ledger.reserve(&unit.requirements) {
            return Err((unit, err));
        }
        for member in &unit.members {
            self.registry.set_status(member, TaskStatus::Running);
        }
        info!(
            unit = unit.id,
            kind = %unit.kind,
            members = unit.members.len(),
            batched = unit.batched,
            total_cost = unit.total_cost,
            "dispatching unit"
        );
        self.in_flight.insert(unit.id, unit.clone());
        Ok(unit)
    }

    fn unit_from_group(&mut self, group: SealedGroup, batched: bool) -> ExecutionUnit {
        let mut requirements = ResourceMap::new();
        let mut deadline: Option<Duration> = None;
        for member in &group.members {
            if let Some(rec) = self.registry.get(member) {
                for (name, &amount) in &rec.spec.requires {
                    *requirements.entry(name.clone()).or_insert(0) += amount;
                }
                if let Some(ms) = rec.spec.deadline_ms {
                    let d = Duration::from_millis(ms);
                    deadline = Some(deadline.map_or(d, |cur| cur.min(d)));
                }
            }
        }
        ExecutionUnit {
            id: self.take_unit_id(),
            kind: group.kind,
            members: group.members,
            batched,
            total_cost: group.total_cost,
            requirements,
            deadline,
        }
    }

    fn singleton_unit(&mut self, spec: &TaskSpec) -> ExecutionUnit {
        ExecutionUnit {
            id: self.take_unit_id(),
            kind: spec.kind.clone(),
            members: vec![spec.id.clone()],
            batched: false,
            total_cost: spec.cost,
            requirements: spec.requires.clone(),
            deadline: spec.deadline_ms.map(Duration::from_millis),
        }
    }

    fn take_unit_id(&mut self) -> UnitId {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        id
    }
}
