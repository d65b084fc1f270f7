// src/resources.rs

//! Finite shared capacity bookkeeping.
//!
//! Each named resource has a fixed total and a currently available amount.
//! `reserve` is all-or-nothing: either every counter is decremented together
//! or none is. Release must be called exactly once per successful
//! reservation; the scheduler core pairs the two around unit execution.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{Result, SchedulerError};

pub type ResourceMap = BTreeMap<String, u64>;

#[derive(Debug, Clone, Copy)]
struct Counter {
    total: u64,
    available: u64,
}

#[derive(Debug)]
pub struct ResourceLedger {
    counters: BTreeMap<String, Counter>,
}

impl ResourceLedger {
    pub fn new(totals: &ResourceMap) -> Self {
        let counters = totals
            .iter()
            .map(|(name, &total)| {
                (
                    name.clone(),
                    Counter {
                        total,
                        available: total,
                    },
                )
            })
            .collect();
        Self { counters }
    }

    /// Validate a task's requirement map at admission time.
    ///
    /// Rejects unknown resource names and requirements that exceed a
    /// counter's total (which could never be admitted).
    pub fn validate_requirements(&self, task: &str, requirements: &ResourceMap) -> Result<()> {
        for (name, &amount) in requirements {
            match self.counters.get(name) {
                None => {
                    return Err(SchedulerError::InvalidResourceSpec {
                        task: task.to_string(),
                        reason: format!("unknown resource '{name}'"),
                    });
                }
                Some(counter) if amount > counter.total => {
                    return Err(SchedulerError::InvalidResourceSpec {
                        task: task.to_string(),
                        reason: format!(
                            "requires {amount} of '{name}' but total capacity is {}",
                            counter.total
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Whether the requirements could ever be reserved, even with every
    /// counter fully free. False means the demand exceeds a total.
    pub fn ever_admissible(&self, requirements: &ResourceMap) -> bool {
        requirements.iter().all(|(name, &amount)| {
            self.counters.get(name).is_some_and(|c| c.total >= amount)
        })
    }

    /// Whether the requirements could be reserved right now. Non-mutating.
    pub fn can_admit(&self, requirements: &ResourceMap) -> bool {
        requirements.iter().all(|(name, &amount)| {
            self.counters
                .get(name)
                .is_some_and(|c| c.available >= amount)
        })
    }

    /// Atomically decrement all counters, or none on shortfall.
    pub fn reserve(&mut self, requirements: &ResourceMap) -> Result<()> {
        for (name, &amount) in requirements {
            let available = self.counters.get(name).map(|c| c.available).unwrap_or(0);
            if available < amount {
                return Err(SchedulerError::InsufficientResources(name.clone()));
            }
        }
        for (name, &amount) in requirements {
            if let Some(counter) = self.counters.get_mut(name) {
                counter.available -= amount;
            }
        }
        debug!(?requirements, "resources reserved");
        Ok(())
    }

    /// Restore counters after a unit finishes, clamping at the total.
    pub fn release(&mut self, requirements: &ResourceMap) {
        for (name, &amount) in requirements {
            if let Some(counter) = self.counters.get_mut(name) {
                counter.available = (counter.available + amount).min(counter.total);
            }
        }
        debug!(?requirements, "resources released");
    }

    pub fn available(&self, name: &str) -> u64 {
        self.counters.get(name).map(|c| c.available).unwrap_or(0)
    }

    /// Reset every counter to its full total (used on recovery, where no
    /// reservations survive a restart).
    pub fn reset(&mut self) {
        for counter in self.counters.values_mut() {
            counter.available = counter.total;
        }
    }
}
