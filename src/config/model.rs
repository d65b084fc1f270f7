// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::resources::ResourceMap;
use crate::task::TaskSpec;
use crate::types::{BatchFailurePolicy, DependentPolicy};

/// Top-level workload file as read from TOML, before semantic validation.
///
/// ```toml
/// [scheduler]
/// max_workers = 4
/// max_batch_capacity = 40
///
/// [resources]
/// cpu = 100
/// memory = 64
///
/// [task.segment_a]
/// kind = "data_processing"
/// priority = 1
/// cost = 20
/// requires = { cpu = 10 }
/// after = []
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global scheduler settings from `[scheduler]`.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Named capacity totals from `[resources]`.
    #[serde(default)]
    pub resources: ResourceMap,

    /// All tasks from `[task.<name>]`, keyed by task identity.
    #[serde(default)]
    pub task: BTreeMap<String, TaskEntry>,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently executing units.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum summed cost of a sealed batch.
    #[serde(default = "default_max_batch_capacity")]
    pub max_batch_capacity: u64,

    /// Bounded retry attempts per task before terminal failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// What happens to dependents of a failed (or cancelled) task.
    #[serde(default)]
    pub dependent_policy: DependentPolicy,

    /// How failed batches are retried.
    #[serde(default)]
    pub batch_failure: BatchFailurePolicy,

    /// Kinds that always execute as singleton units.
    #[serde(default = "default_non_batchable_kinds")]
    pub non_batchable_kinds: Vec<String>,

    /// Simulated execution time per cost unit, in milliseconds.
    #[serde(default = "default_cost_unit_ms")]
    pub cost_unit_ms: u64,

    /// Number of terminal task records retained for late queries.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Where the recovery log lives; `None` disables persistence.
    #[serde(default)]
    pub recovery_log: Option<PathBuf>,
}

fn default_max_workers() -> usize {
    4
}

fn default_max_batch_capacity() -> u64 {
    40
}

fn default_max_retries() -> u32 {
    2
}

fn default_non_batchable_kinds() -> Vec<String> {
    vec!["attention".to_string()]
}

fn default_cost_unit_ms() -> u64 {
    10
}

fn default_retention() -> usize {
    256
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_batch_capacity: default_max_batch_capacity(),
            max_retries: default_max_retries(),
            dependent_policy: DependentPolicy::default(),
            batch_failure: BatchFailurePolicy::default(),
            non_batchable_kinds: default_non_batchable_kinds(),
            cost_unit_ms: default_cost_unit_ms(),
            retention: default_retention(),
            recovery_log: None,
        }
    }
}

impl SchedulerConfig {
    pub fn is_batchable(&self, kind: &str) -> bool {
        !self.non_batchable_kinds.iter().any(|k| k == kind)
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    /// Task kind; decides batch compatibility, independent of priority.
    pub kind: String,

    /// Lower value = more urgent. Defaults to 0.
    #[serde(default)]
    pub priority: i32,

    /// Positive size unit consumed by batch capacity.
    pub cost: u64,

    /// Named resource requirements, validated against `[resources]`.
    #[serde(default)]
    pub requires: ResourceMap,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Opaque payload reference passed through to workers.
    #[serde(default)]
    pub payload: Option<String>,

    /// Optional execution deadline in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Validated configuration. Constructed only via
/// `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    scheduler: SchedulerConfig,
    resources: ResourceMap,
    task: BTreeMap<String, TaskEntry>,
}

impl ConfigFile {
    /// Internal constructor for validated data; do not call directly.
    pub(crate) fn new_unchecked(
        scheduler: SchedulerConfig,
        resources: ResourceMap,
        task: BTreeMap<String, TaskEntry>,
    ) -> Self {
        Self {
            scheduler,
            resources,
            task,
        }
    }

    pub fn scheduler(&self) -> &SchedulerConfig {
        &self.scheduler
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskEntry> {
        &self.task
    }

    /// Submission specs in deterministic (name) order.
    pub fn task_specs(&self) -> Vec<TaskSpec> {
        self.task
            .iter()
            .map(|(name, entry)| TaskSpec {
                id: name.clone(),
                kind: entry.kind.clone(),
                priority: entry.priority,
                cost: entry.cost,
                requires: entry.requires.clone(),
                after: entry.after.clone(),
                payload: entry.payload.clone(),
                deadline_ms: entry.deadline_ms,
            })
            .collect()
    }
}
