// src/engine/handle.rs

//! Cloneable API handle over the runtime event channel.

use tokio::sync::{mpsc, oneshot};

use crate::engine::RuntimeEvent;
use crate::errors::{Result, SchedulerError};
use crate::task::{TaskSpec, TaskView};
use crate::types::TaskId;

/// The submission/query/control surface external collaborators consume.
///
/// Every method sends an event to the runtime and awaits a oneshot reply.
/// A closed channel (runtime gone) surfaces as `ShuttingDown`.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl SchedulerHandle {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    pub async fn submit(&self, spec: TaskSpec) -> Result<TaskId> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeEvent::Submit { spec, reply }).await?;
        rx.await.map_err(|_| SchedulerError::ShuttingDown)?
    }

    pub async fn status(&self, task: impl Into<TaskId>) -> Result<TaskView> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeEvent::Status {
            task: task.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SchedulerError::ShuttingDown)?
    }

    pub async fn cancel(&self, task: impl Into<TaskId>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeEvent::Cancel {
            task: task.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SchedulerError::ShuttingDown)?
    }

    /// Ask the runtime to shut down gracefully. Returns once the request is
    /// queued; the runtime drains in-flight units before exiting.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(RuntimeEvent::ShutdownRequested).await
    }

    async fn send(&self, event: RuntimeEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| SchedulerError::ShuttingDown)
    }
}
