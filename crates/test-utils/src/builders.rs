#![allow(dead_code)]

use std::collections::BTreeMap;

use batchdag::resources::ResourceMap;
use batchdag::task::TaskSpec;

/// Builder for `TaskSpec` to simplify test setup.
///
/// Defaults: kind `"infer"`, priority 0, cost 1, no requirements, no
/// dependencies, no deadline.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            spec: TaskSpec {
                id: id.to_string(),
                kind: "infer".to_string(),
                priority: 0,
                cost: 1,
                requires: BTreeMap::new(),
                after: vec![],
                payload: None,
                deadline_ms: None,
            },
        }
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.spec.kind = kind.to_string();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = priority;
        self
    }

    pub fn cost(mut self, cost: u64) -> Self {
        self.spec.cost = cost;
        self
    }

    pub fn requires(mut self, resource: &str, amount: u64) -> Self {
        self.spec.requires.insert(resource.to_string(), amount);
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.spec.after.push(dep.to_string());
        self
    }

    pub fn payload(mut self, payload: &str) -> Self {
        self.spec.payload = Some(payload.to_string());
        self
    }

    pub fn deadline_ms(mut self, ms: u64) -> Self {
        self.spec.deadline_ms = Some(ms);
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// Resource totals from `(name, total)` pairs.
pub fn resources(pairs: &[(&str, u64)]) -> ResourceMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
