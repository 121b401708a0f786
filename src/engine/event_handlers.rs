// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info};

use crate::dag::{RunSummary, Scheduler, SchedulerStep, ScheduledTask, TaskRunState};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// A run finished; surface its summary.
    ReportRun(RunSummary),
    /// Stop with a missing-binary error.
    AbortMissingBinary { task: TaskName, program: String },
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn stop(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }

    /// Tasks dispatched by this step, in order.
    pub fn dispatched(&self) -> Vec<&ScheduledTask> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Run summaries reported by this step.
    pub fn summaries(&self) -> Vec<&RunSummary> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::ReportRun(summary) => Some(summary),
                _ => None,
            })
            .collect()
    }
}

/// Handle a request to run a group of tasks.
///
/// - Idle scheduler: start a new run with the group.
/// - Active run:
///   - tasks not in the run are merged into it immediately (with their
///     dependencies), unless a dependency already failed in it: those wait
///     for the next run;
///   - tasks still `Pending` will run anyway and are ignored;
///   - tasks that already started are recorded in the queue for a future run.
pub fn handle_run_request(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    tasks: Vec<TaskName>,
    reason: TriggerReason,
) -> CoreStep {
    let mut commands = Vec::new();

    if scheduler.is_idle() {
        info!(?tasks, ?reason, "starting run");
        let step = scheduler.step_request(&tasks);
        apply_step(step, &mut commands);
    } else {
        let mut merge = Vec::new();
        let mut requeue = Vec::new();
        for task in tasks {
            match scheduler.run_state_of(&task) {
                None => debug!(task = %task, "request for unknown task; ignoring"),
                Some(TaskRunState::NotInRun) if scheduler.blocked_by_failure(&task) => {
                    requeue.push(task)
                }
                Some(TaskRunState::NotInRun) => merge.push(task),
                Some(TaskRunState::Pending) => {
                    debug!(task = %task, "already pending in this run")
                }
                Some(_) => requeue.push(task),
            }
        }

        if !merge.is_empty() {
            info!(tasks = ?merge, ?reason, "merging tasks into active run");
            let step = scheduler.step_request(&merge);
            apply_step(step, &mut commands);
        }
        if !requeue.is_empty() {
            info!(tasks = ?requeue, ?reason, "tasks already ran in this run; queued for rerun");
            queue.record_batch(requeue);
        }
    }

    finish(scheduler, queue, options, commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();
    let step = scheduler.step_completion(&task, outcome);
    apply_step(step, &mut commands);
    finish(scheduler, queue, options, commands)
}

/// Handle a missing supervised binary: always fatal.
pub fn handle_missing_binary(task: TaskName, program: String) -> CoreStep {
    CoreStep::stop(vec![CoreCommand::AbortMissingBinary { task, program }])
}

fn apply_step(step: SchedulerStep, commands: &mut Vec<CoreCommand>) {
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    if let Some(summary) = step.finished {
        commands.push(CoreCommand::ReportRun(summary));
    }
}

/// Start queued runs while idle, then decide whether to keep running.
fn finish(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    while scheduler.is_idle() {
        let Some(batch) = queue.next_batch() else {
            break;
        };
        info!(tasks = ?batch, "starting queued run");
        let step = scheduler.step_request(&batch);
        apply_step(step, &mut commands);
    }

    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        commands.push(CoreCommand::RequestExit);
        return CoreStep::stop(commands);
    }

    CoreStep {
        commands,
        keep_running: true,
    }
}
