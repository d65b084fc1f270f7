// src/errors.rs

//! Crate-wide error types.

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task already submitted: {0}")]
    DuplicateIdentity(TaskId),

    #[error("Cycle detected in dependency graph involving task '{0}'")]
    CyclicDependency(TaskId),

    #[error("Invalid resource specification for task '{task}': {reason}")]
    InvalidResourceSpec { task: TaskId, reason: String },

    #[error("Insufficient resources for '{0}'")]
    InsufficientResources(String),

    #[error("All worker slots are busy")]
    CapacityExceeded,

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Task '{task}' cannot be cancelled while {status}")]
    NotCancellable { task: TaskId, status: String },

    #[error("Scheduler is shutting down; submissions are closed")]
    ShuttingDown,

    #[error("Recovery log error: {0}")]
    Recovery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Recovery record encoding error: {0}")]
    RecordEncoding(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedulerError>;
