// src/engine/mod.rs

//! The run engine.
//!
//! [`core::CoreRuntime`] is a synchronous state machine: it consumes one
//! [`RuntimeEvent`] at a time and answers with [`CoreCommand`]s. The async
//! [`runtime::Runtime`] feeds it from a channel and carries the commands out
//! against an [`crate::exec::ExecutorBackend`].

pub type TaskName = String;

/// Outcome of one task run, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The task ran to the end but skipped this many files because of
    /// per-file errors.
    CompletedWithErrors(usize),
    Failed(i32),
}

impl TaskOutcome {
    /// Whether dependents may start after this outcome.
    pub fn satisfies_dependents(self) -> bool {
        !matches!(self, TaskOutcome::Failed(_))
    }
}

/// Why a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Requested on the command line or at startup.
    Manual,
    /// A watch rule matched a filesystem event.
    FileWatch,
}

/// Knobs shared by the core and its async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once the scheduler is idle and nothing is queued (`--once`).
    pub exit_when_idle: bool,
}

/// Inputs to the engine. Sources: startup, watcher, executor, Ctrl-C.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Run these tasks (and their dependencies) as one group.
    RunRequested {
        tasks: Vec<TaskName>,
        reason: TriggerReason,
    },
    /// A dispatched task finished.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// The supervised server's executable does not exist.
    BinaryMissing { task: TaskName, program: String },
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use crate::types::TriggerWhileRunningBehaviour;
pub use runtime::Runtime;
