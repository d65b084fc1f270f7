// src/sched/mod.rs

//! The scheduler core: admission, readiness, batching and dispatch
//! accounting, all as synchronous, deterministic state transitions.
//!
//! The core owns every piece of mutable scheduler state and performs no IO;
//! the async shell (`engine::runtime`) feeds it events and carries out the
//! dispatches it emits. This split keeps the scheduling semantics unit
//! testable without Tokio, channels, or a filesystem.

pub mod core;
pub mod step;

pub use self::core::SchedulerCore;
pub use step::SchedStep;
