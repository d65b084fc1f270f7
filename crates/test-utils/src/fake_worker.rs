use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use batchdag::batch::{ExecutionUnit, UnitId};
use batchdag::engine::{RuntimeEvent, UnitOutcome};
use batchdag::errors::{Result, SchedulerError};
use batchdag::exec::WorkerBackend;
use batchdag::types::TaskId;

/// A fake worker backend that:
/// - records every unit it was handed (and the waves they arrived in)
/// - immediately reports `UnitFinished` for each unit, `Completed` unless a
///   member has scripted failures remaining.
pub struct FakeWorker {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<ExecutionUnit>>>,
    waves: Arc<Mutex<Vec<Vec<UnitId>>>>,
    /// task id -> number of times a unit containing it should still fail.
    failures: Arc<Mutex<HashMap<TaskId, u32>>>,
}

/// Read side of a [`FakeWorker`], usable after the worker moved into the
/// runtime.
#[derive(Clone)]
pub struct FakeWorkerProbe {
    executed: Arc<Mutex<Vec<ExecutionUnit>>>,
    waves: Arc<Mutex<Vec<Vec<UnitId>>>>,
}

impl FakeWorker {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            executed: Arc::new(Mutex::new(Vec::new())),
            waves: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Script the next `times` units containing `task` to fail.
    pub fn fail_times(&self, task: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(task.to_string(), times);
    }

    pub fn probe(&self) -> FakeWorkerProbe {
        FakeWorkerProbe {
            executed: Arc::clone(&self.executed),
            waves: Arc::clone(&self.waves),
        }
    }
}

impl FakeWorkerProbe {
    /// All executed units, in execution order.
    pub fn executed_units(&self) -> Vec<ExecutionUnit> {
        self.executed.lock().unwrap().clone()
    }

    /// Member task ids flattened in execution order.
    pub fn executed_tasks(&self) -> Vec<TaskId> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .flat_map(|u| u.members.clone())
            .collect()
    }

    /// Unit ids grouped by the `run_units` call that delivered them. Each
    /// wave is a set of concurrently in-flight units.
    pub fn unit_waves(&self) -> Vec<Vec<UnitId>> {
        self.waves.lock().unwrap().clone()
    }
}

impl WorkerBackend for FakeWorker {
    fn run_units(
        &mut self,
        units: Vec<ExecutionUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let waves = Arc::clone(&self.waves);
        let failures = Arc::clone(&self.failures);

        Box::pin(async move {
            waves
                .lock()
                .unwrap()
                .push(units.iter().map(|u| u.id).collect());

            for unit in units {
                let outcome = {
                    let mut failures = failures.lock().unwrap();
                    let mut fail = false;
                    for member in &unit.members {
                        if let Some(remaining) = failures.get_mut(member) {
                            if *remaining > 0 {
                                *remaining -= 1;
                                fail = true;
                            }
                        }
                    }
                    if fail {
                        UnitOutcome::Failed("scripted failure".to_string())
                    } else {
                        UnitOutcome::Completed
                    }
                };

                executed.lock().unwrap().push(unit.clone());
                tx.send(RuntimeEvent::UnitFinished {
                    unit: unit.id,
                    outcome,
                })
                .await
                .map_err(|_| SchedulerError::ShuttingDown)?;
            }
            Ok(())
        })
    }
}
