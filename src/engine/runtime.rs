// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::batch::ExecutionUnit;
use crate::errors::Result;
use crate::exec::WorkerBackend;
use crate::sched::SchedulerCore;

use super::{RuntimeEvent, RuntimeOptions};

/// Drives the scheduler core in response to `RuntimeEvent`s and delegates
/// unit execution to a `WorkerBackend`.
///
/// This is a pure IO shell around [`SchedulerCore`], which contains all the
/// scheduling semantics. The shell reads events from the channel, answers
/// API replies, hands dispatched units to workers, and persists state on
/// shutdown.
pub struct Runtime<W: WorkerBackend> {
    core: SchedulerCore,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    workers: W,
    options: RuntimeOptions,
}

impl<W: WorkerBackend> fmt::Debug for Runtime<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<W: WorkerBackend> Runtime<W> {
    pub fn new(
        core: SchedulerCore,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        workers: W,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            core,
            event_rx,
            workers,
            options,
        }
    }

    /// Main event loop.
    ///
    /// Pumps once up front (the core may have been seeded before the loop
    /// started), then consumes events until shutdown or, with
    /// `exit_when_idle`, until nothing is queued, deferred, or running.
    pub async fn run(mut self) -> Result<()> {
        info!("batchdag runtime started");

        let units = self.core.pump();
        self.run_units(units).await?;
        if self.options.exit_when_idle && self.core.is_idle() {
            info!("nothing to do; exiting");
            self.persist_state()?;
            return Ok(());
        }

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("runtime event channel closed; exiting");
                break;
            };
            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::Submit { spec, reply } => {
                    let result = self.core.submit(spec);
                    let _ = reply.send(result);
                    let units = self.core.pump();
                    self.run_units(units).await?;
                }
                RuntimeEvent::Cancel { task, reply } => {
                    let result = self.core.cancel(&task).map(|_step| ());
                    let _ = reply.send(result);
                }
                RuntimeEvent::Status { task, reply } => {
                    let _ = reply.send(self.core.status(&task));
                }
                RuntimeEvent::UnitFinished { unit, outcome } => {
                    let step = self.core.handle_unit_outcome(unit, outcome);
                    if !step.newly_failed.is_empty() {
                        warn!(failed = ?step.newly_failed, "tasks terminally failed");
                    }
                    self.run_units(step.dispatched).await?;
                    if step.became_idle {
                        self.persist_state()?;
                        if self.options.exit_when_idle {
                            info!("scheduler idle; exiting");
                            break;
                        }
                    }
                }
                RuntimeEvent::ShutdownRequested => {
                    self.core.begin_shutdown();
                    self.drain_in_flight().await;
                    self.persist_state()?;
                    info!("shutdown complete");
                    break;
                }
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Wait for every in-flight unit to report back.
    ///
    /// `begin_shutdown` disabled dispatching, so outcomes only settle state;
    /// queries are still answered and late submissions are refused by the
    /// core.
    async fn drain_in_flight(&mut self) {
        while self.core.in_flight_len() > 0 {
            let Some(event) = self.event_rx.recv().await else {
                warn!("event channel closed while draining in-flight units");
                return;
            };
            match event {
                RuntimeEvent::UnitFinished { unit, outcome } => {
                    self.core.handle_unit_outcome(unit, outcome);
                }
                RuntimeEvent::Submit { spec, reply } => {
                    let _ = reply.send(self.core.submit(spec));
                }
                RuntimeEvent::Cancel { task, reply } => {
                    let _ = reply.send(self.core.cancel(&task).map(|_step| ()));
                }
                RuntimeEvent::Status { task, reply } => {
                    let _ = reply.send(self.core.status(&task));
                }
                RuntimeEvent::ShutdownRequested => {}
            }
        }
    }

    fn persist_state(&self) -> Result<()> {
        let Some(log) = &self.options.recovery else {
            return Ok(());
        };
        let snapshot = self.core.snapshot();
        if snapshot.is_empty() {
            log.clear()
        } else {
            log.persist(&snapshot)
        }
    }

    async fn run_units(&mut self, units: Vec<ExecutionUnit>) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }
        let ids: Vec<_> = units.iter().map(|u| u.id).collect();
        debug!(?ids, "handing units to workers");
        self.workers.run_units(units).await
    }
}
