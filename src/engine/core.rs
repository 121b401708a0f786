// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! A synchronous, deterministic "core runtime" that consumes
//! [`RuntimeEvent`]s and produces an updated state plus a list of commands
//! describing what the IO shell should do next.
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! sends `ScheduledTask`s to the executor and handles shutdown. The core is
//! unit tested without any Tokio, channels, filesystem, or processes.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_missing_binary, handle_run_request, handle_task_completion, CoreStep,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::types::TriggerWhileRunningBehaviour;

/// Pure core runtime state: scheduler, trigger queue and options.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(behaviour, queue_length),
            options,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, returning the commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::RunRequested { tasks, reason } => handle_run_request(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                tasks,
                reason,
            ),
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::BinaryMissing { task, program } => handle_missing_binary(task, program),
            RuntimeEvent::ShutdownRequested => CoreStep::stop(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{TaskAction, TaskRegistry};
    use crate::engine::{CoreCommand, TaskOutcome, TriggerReason};

    fn core(options: RuntimeOptions) -> CoreRuntime {
        let mut reg = TaskRegistry::new();
        reg.register("css", vec![], TaskAction::command("true")).unwrap();
        reg.register("spawn", vec!["css".into()], TaskAction::spawn())
            .unwrap();
        CoreRuntime::new(
            Scheduler::new(reg),
            TriggerWhileRunningBehaviour::Queue,
            1,
            options,
        )
    }

    fn request(tasks: &[&str]) -> RuntimeEvent {
        RuntimeEvent::RunRequested {
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
            reason: TriggerReason::FileWatch,
        }
    }

    fn completed(task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskCompleted {
            task: task.to_string(),
            outcome: TaskOutcome::Success,
        }
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.dispatched().iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn retrigger_of_running_task_is_queued_and_coalesced() {
        let mut core = core(RuntimeOptions::default());

        assert_eq!(dispatched(&core.step(request(&["css"]))), vec!["css"]);
        assert!(core.step(request(&["css"])).commands.is_empty());
        assert!(core.step(request(&["css"])).commands.is_empty());
        assert!(!core.queue_is_empty());

        let step = core.step(completed("css"));
        assert_eq!(step.summaries().len(), 1);
        assert_eq!(dispatched(&step), vec!["css"]);
        assert!(core.queue_is_empty());

        let step = core.step(completed("css"));
        assert_eq!(step.summaries().len(), 1);
        assert!(step.dispatched().is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn new_task_is_merged_into_active_run() {
        let mut core = core(RuntimeOptions::default());
        core.step(request(&["css"]));

        let step = core.step(request(&["spawn"]));
        assert!(step.dispatched().is_empty());
        assert!(core.queue_is_empty());

        let step = core.step(completed("css"));
        assert_eq!(dispatched(&step), vec!["spawn"]);
    }

    #[test]
    fn request_behind_failed_dependency_waits_for_next_run() {
        let mut reg = TaskRegistry::new();
        reg.register("css", vec![], TaskAction::command("false")).unwrap();
        reg.register("js", vec![], TaskAction::command("true")).unwrap();
        reg.register("build", vec!["css".into(), "js".into()], TaskAction::default())
            .unwrap();
        let mut core = CoreRuntime::new(
            Scheduler::new(reg),
            TriggerWhileRunningBehaviour::Queue,
            1,
            RuntimeOptions::default(),
        );

        assert_eq!(dispatched(&core.step(request(&["css", "js"]))), vec!["css", "js"]);
        core.step(RuntimeEvent::TaskCompleted {
            task: "css".into(),
            outcome: TaskOutcome::Failed(1),
        });

        let step = core.step(request(&["build"]));
        assert!(step.dispatched().is_empty());
        assert!(!core.queue_is_empty());

        let step = core.step(completed("js"));
        let summaries = step.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].failed, vec!["css".to_string()]);
        assert_eq!(dispatched(&step), vec!["css", "js"]);
        assert!(core.queue_is_empty());

        core.step(completed("css"));
        let step = core.step(completed("js"));
        assert_eq!(dispatched(&step), vec!["build"]);
        let step = core.step(completed("build"));
        assert!(step.summaries()[0].is_success());
        assert!(core.is_idle());
    }

    #[test]
    fn once_mode_exits_when_idle() {
        let mut core = core(RuntimeOptions {
            exit_when_idle: true,
        });
        assert!(core.step(request(&["css"])).keep_running);
        let step = core.step(completed("css"));
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
    }

    #[test]
    fn missing_binary_stops_the_runtime() {
        let mut core = core(RuntimeOptions::default());
        let step = core.step(RuntimeEvent::BinaryMissing {
            task: "spawn".into(),
            program: "./OBIJudge".into(),
        });
        assert!(!step.keep_running);
        assert!(matches!(
            step.commands.as_slice(),
            [CoreCommand::AbortMissingBinary { .. }]
        ));
    }
}
