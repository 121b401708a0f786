// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::TaskRegistry;
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    registry: &'a TaskRegistry,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        registry: &'a TaskRegistry,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            registry,
            tasks,
            current_run_id,
        }
    }

    /// Include a requested task and everything it depends on in this run.
    ///
    /// Tasks already participating keep their current state.
    pub fn mark_task_and_dependencies_pending(&mut self, root: &str) {
        let closure = match self.registry.closure(&[root]) {
            Ok(c) => c,
            Err(e) => {
                warn!(task = %root, error = %e, "cannot resolve dependency closure");
                return;
            }
        };

        for name in closure {
            match self.tasks.get_mut(&name) {
                Some(info) if info.run_state.is_none() => {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, "marked Pending for this run");
                }
                Some(_) => {}
                None => warn!(task = %name, "task in registry but not in tasks map"),
            }
        }
    }

    /// Mark every pending dependent of `task`, transitively, as `Skipped`.
    pub fn mark_dependents_skipped(&mut self, task: &str) -> Vec<TaskName> {
        let mut stack = self.registry.dependents_of(task);
        let mut skipped = Vec::new();

        while let Some(name) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            if info.run_state == Some(RunState::Pending) {
                info.run_state = Some(RunState::Skipped);
                warn!(task = %info.name, upstream = %task, "skipping task: dependency did not complete");
                skipped.push(info.name.clone());
                stack.extend(self.registry.dependents_of(&name));
            }
        }

        skipped
    }

    /// Skip `Pending` tasks sitting behind a task that already failed or was
    /// skipped in this run. Needed after merging new tasks into a run, since
    /// the failure's own skip pass could not see them.
    pub fn skip_behind_failures(&mut self) -> Vec<TaskName> {
        let mut blocked: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| info.run_state.is_some_and(RunState::blocks_dependents))
            .map(|info| info.name.clone())
            .collect();
        blocked.sort_unstable();

        let mut skipped = Vec::new();
        for name in blocked {
            skipped.extend(self.mark_dependents_skipped(&name));
        }
        skipped
    }

    /// Collect tasks that are `Pending` with all dependencies satisfied,
    /// mark them `Running`, and return them as `ScheduledTask`s.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut candidates: Vec<TaskName> = {
            let ro = ReadOnlyStateManager::new(self.tasks);
            self.tasks
                .values()
                .filter(|info| info.run_state == Some(RunState::Pending))
                .filter(|info| ro.deps_satisfied_for_info(info))
                .map(|info| info.name.clone())
                .collect()
        };
        candidates.sort_unstable();

        let run_id = self.current_run_id.unwrap_or(0);
        let mut ready = Vec::with_capacity(candidates.len());

        for name in candidates {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            let Some(action) = self.registry.action_of(&name) else {
                warn!(task = %name, "task missing from registry");
                continue;
            };

            let is_rerun = info.last_successful_run.is_some() || info.last_failed_run.is_some();
            if is_rerun {
                info!(task = %name, run_id, "re-running task");
            } else {
                info!(task = %name, run_id, "starting task");
            }

            info.run_state = Some(RunState::Running);
            ready.push(ScheduledTask {
                name,
                action: action.clone(),
                run_id,
            });
        }

        ready
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks
            .values()
            .all(|info| info.run_state.is_none_or(RunState::is_terminal))
    }
}

/// Read-only view used when only shared access to the tasks map is available.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A task may start once every dependency has completed in this run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => dep.run_state.is_some_and(RunState::satisfies_dependents),
            None => {
                warn!(task = %info.name, dep = %dep_name, "dependency missing from tasks map");
                false
            }
        })
    }
}
