// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskRegistry;
use crate::dag::scheduler_step::{RunSummary, SchedulerStep};
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};

/// Scheduler holds the task registry plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - pulling in the dependency closure of requested tasks
/// - deciding when a task is ready (every dependency completed)
/// - skipping dependents when a task fails
/// - summarizing the run once every participating task is terminal
#[derive(Debug)]
pub struct Scheduler {
    registry: TaskRegistry,
    tasks: HashMap<TaskName, TaskInfo>,
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new(registry: TaskRegistry) -> Self {
        let tasks = registry
            .tasks()
            .into_iter()
            .map(|name| {
                let deps = registry.dependencies_of(name).to_vec();
                (name.to_string(), TaskInfo::new(name.to_string(), deps))
            })
            .collect();

        Self {
            registry,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// Read-only view of the given task's run state; `None` for unknown tasks.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Whether anything `task` depends on already failed or was skipped in the
    /// active run, so merging it now could only skip it.
    pub fn blocked_by_failure(&self, task: &str) -> bool {
        let Ok(closure) = self.registry.closure(&[task]) else {
            return false;
        };
        closure.iter().any(|name| {
            self.tasks
                .get(name)
                .and_then(|info| info.run_state)
                .is_some_and(RunState::blocks_dependents)
        })
    }

    /// Whether the dependencies of `task` are satisfied for the current run.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(ReadOnlyStateManager::new(&self.tasks).deps_satisfied_for_info(info))
    }

    /// Start a new run, resetting per-run state.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Request a group of tasks; returns the tasks that became ready.
    pub fn handle_request(&mut self, tasks: &[TaskName]) -> Vec<ScheduledTask> {
        self.request_step_internal(tasks).newly_scheduled
    }

    /// Manual-step variant of `handle_request`.
    pub fn step_request(&mut self, tasks: &[TaskName]) -> SchedulerStep {
        self.request_step_internal(tasks)
    }

    /// Record the outcome of a dispatched task.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.registry.tasks()
    }

    /// Finish the run if every participating task is terminal.
    fn maybe_finish_run(&mut self) -> Option<RunSummary> {
        let run_id = self.current_run_id?;

        let manager = StateManager::new(&self.registry, &mut self.tasks, self.current_run_id);
        if !manager.all_tasks_terminal() {
            return None;
        }

        let mut summary = RunSummary {
            run_id,
            ..RunSummary::default()
        };
        let mut names: Vec<&TaskName> = self.tasks.keys().collect();
        names.sort_unstable();
        for name in names {
            match self.tasks[name].run_state {
                Some(RunState::DoneSuccess) => summary.succeeded.push(name.clone()),
                Some(RunState::DoneWithErrors(n)) => summary.with_errors.push((name.clone(), n)),
                Some(RunState::DoneFailed(_)) => summary.failed.push(name.clone()),
                Some(RunState::Skipped) => summary.skipped.push(name.clone()),
                Some(RunState::Pending) | Some(RunState::Running) | None => {}
            }
        }

        info!(
            run_id,
            succeeded = summary.succeeded.len(),
            with_errors = summary.with_errors.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "run finished"
        );
        self.current_run_id = None;
        Some(summary)
    }

    fn request_step_internal(&mut self, tasks: &[TaskName]) -> SchedulerStep {
        if self.current_run_id.is_none() {
            self.start_new_run();
        }

        for task in tasks {
            if self.tasks.contains_key(task) {
                let mut manager =
                    StateManager::new(&self.registry, &mut self.tasks, self.current_run_id);
                manager.mark_task_and_dependencies_pending(task);
            } else {
                warn!(task = %task, "request for unknown task; ignoring");
            }
        }

        let mut manager = StateManager::new(&self.registry, &mut self.tasks, self.current_run_id);
        let newly_skipped = manager.skip_behind_failures();
        let newly_scheduled = manager.collect_new_ready_tasks();
        let finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            finished,
            ..SchedulerStep::default()
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let mut step = SchedulerStep::default();

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return step;
        };
        if info.run_state != Some(RunState::Running) {
            warn!(task = %task, state = ?info.run_state, "completion for task that is not running; ignoring");
            return step;
        }

        match outcome {
            TaskOutcome::Success => {
                info.run_state = Some(RunState::DoneSuccess);
                info.last_successful_run = Some(run_id);
                debug!(task = %task, run_id, "task completed successfully");
            }
            TaskOutcome::CompletedWithErrors(n) => {
                info.run_state = Some(RunState::DoneWithErrors(n));
                info.last_successful_run = Some(run_id);
                warn!(task = %task, run_id, errors = n, "task completed with errors");
            }
            TaskOutcome::Failed(code) => {
                info.run_state = Some(RunState::DoneFailed(code));
                info.last_failed_run = Some(run_id);
                warn!(task = %task, run_id, exit_code = code, "task failed; skipping dependents");
                step.newly_failed.push(task.to_string());
            }
        }

        let mut manager = StateManager::new(&self.registry, &mut self.tasks, self.current_run_id);
        if outcome.satisfies_dependents() {
            step.newly_scheduled = manager.collect_new_ready_tasks();
        } else {
            step.newly_skipped = manager.mark_dependents_skipped(task);
        }

        step.finished = self.maybe_finish_run();
        step
    }
}
