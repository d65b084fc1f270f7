// src/exec/mod.rs

//! Worker pool: runs dispatched execution units off the coordination loop.
//!
//! The runtime talks to a [`WorkerBackend`] instead of a raw channel, so
//! tests can swap in a fake that completes units instantly. The production
//! backend forwards units to a background pool bounded by a semaphore.

pub mod backend;
pub mod unit_runner;
pub mod worker_pool;

pub use backend::{RealWorkerBackend, WorkerBackend};
pub use worker_pool::spawn_worker_pool;
