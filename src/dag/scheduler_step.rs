// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
///
/// Tests use this to step the graph manually and make assertions about what
/// changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks that failed in this step.
    pub newly_failed: Vec<TaskName>,
    /// Dependents that will not run because of an upstream failure.
    pub newly_skipped: Vec<TaskName>,
    /// Set when this step finished the active run.
    pub finished: Option<RunSummary>,
}

impl SchedulerStep {
    pub fn run_just_finished(&self) -> bool {
        self.finished.is_some()
    }
}

/// What happened to every task of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: u64,
    pub succeeded: Vec<TaskName>,
    /// Tasks that completed with skipped files, with the number of errors.
    pub with_errors: Vec<(TaskName, usize)>,
    pub failed: Vec<TaskName>,
    pub skipped: Vec<TaskName>,
}

impl RunSummary {
    /// True if every task ran to completion (file errors allowed).
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}
