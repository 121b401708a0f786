// src/dag/task_info.rs

//! Task metadata, actions and per-run state.

use std::path::PathBuf;

use crate::config::model::TaskConfig;
use crate::engine::TaskName;
use crate::pipeline::builtin::stage_from_config;
use crate::pipeline::PipelineSpec;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Requested for this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    DoneSuccess,
    /// Completed, but some files were skipped because of per-file errors.
    DoneWithErrors(usize),
    DoneFailed(i32),
    /// Never started because a dependency failed or was skipped.
    Skipped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }

    /// Whether dependents may start.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, RunState::DoneSuccess | RunState::DoneWithErrors(_))
    }

    /// Terminal without satisfying dependents.
    pub fn blocks_dependents(self) -> bool {
        matches!(self, RunState::DoneFailed(_) | RunState::Skipped)
    }
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not participating in this run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneWithErrors(usize),
    DoneFailed(i32),
    Skipped,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneWithErrors(n)) => TaskRunState::DoneWithErrors(n),
            Some(RunState::DoneFailed(code)) => TaskRunState::DoneFailed(code),
            Some(RunState::Skipped) => TaskRunState::Skipped,
        }
    }
}

/// What a task does when it runs.
///
/// `cmd`, `pipelines` and `clean` run concurrently. `spawn` hands the task to
/// the process supervisor. An action with nothing set is a group: it
/// succeeds as soon as its dependencies have.
#[derive(Debug, Clone, Default)]
pub struct TaskAction {
    pub cmd: Option<String>,
    pub pipelines: Vec<PipelineSpec>,
    pub clean: Vec<PathBuf>,
    pub spawn: bool,
    pub reload: bool,
}

impl TaskAction {
    pub fn from_config(cfg: &TaskConfig) -> Self {
        let pipelines = cfg
            .pipeline
            .iter()
            .map(|p| PipelineSpec {
                src: p.src.clone(),
                dest: PathBuf::from(&p.dest),
                stages: p.stages.iter().map(stage_from_config).collect(),
            })
            .collect();

        Self {
            cmd: cfg.cmd.clone(),
            pipelines,
            clean: cfg.clean.iter().map(PathBuf::from).collect(),
            spawn: cfg.spawn,
            reload: cfg.reload,
        }
    }

    /// A shell command action.
    pub fn command(cmd: impl Into<String>) -> Self {
        Self {
            cmd: Some(cmd.into()),
            ..Self::default()
        }
    }

    /// A supervisor spawn action.
    pub fn spawn() -> Self {
        Self {
            spawn: true,
            ..Self::default()
        }
    }

    pub fn is_group(&self) -> bool {
        !self.spawn && self.cmd.is_none() && self.pipelines.is_empty() && self.clean.is_empty()
    }

    /// Short human-readable description, for `--dry-run` and logs.
    pub fn describe(&self) -> String {
        if self.spawn {
            return "spawn server".to_string();
        }
        let mut parts = Vec::new();
        if let Some(cmd) = &self.cmd {
            parts.push(format!("cmd `{cmd}`"));
        }
        for p in &self.pipelines {
            let stages: Vec<&str> = p.stages.iter().map(|s| s.name()).collect();
            parts.push(format!(
                "pipeline {:?} -> {} [{}]",
                p.src,
                p.dest.display(),
                stages.join(", ")
            ));
        }
        if !self.clean.is_empty() {
            parts.push(format!("clean {:?}", self.clean));
        }
        if parts.is_empty() {
            parts.push("group".to_string());
        }
        if self.reload {
            parts.push("reload".to_string());
        }
        parts.join("; ")
    }
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Direct dependencies for this task (names in `after = [...]`).
    pub deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Last run ID in which this task completed (with or without file errors).
    pub last_successful_run: Option<u64>,

    /// Last run ID in which this task failed.
    pub last_failed_run: Option<u64>,
}

impl TaskInfo {
    pub fn new(name: TaskName, deps: Vec<TaskName>) -> Self {
        Self {
            name,
            deps,
            run_state: None,
            last_successful_run: None,
            last_failed_run: None,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub action: TaskAction,
    /// All tasks dispatched for the same run share the same `run_id`.
    pub run_id: u64,
}
