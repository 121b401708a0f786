// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`graph`] holds the [`TaskRegistry`]: named tasks, their actions and
//!   dependency edges, checked for cycles as they are added.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run, and which must be skipped.
//! - [`task_info`] provides task actions and scheduled task types.
//! - [`scheduler_step`] defines the result types for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::TaskRegistry;
pub use scheduler::Scheduler;
pub use scheduler_step::{RunSummary, SchedulerStep};
pub use task_info::{ScheduledTask, TaskAction, TaskRunState};
