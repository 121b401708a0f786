// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{RunSummary, ScheduledTask};
use crate::errors::{DevpipeError, Result};
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s and delegates task
/// execution to an `ExecutorBackend`.
///
/// All semantics live in [`CoreRuntime`]; this shell only reads events from
/// the channel and carries out the commands the core returns.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    summaries: Vec<RunSummary>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            summaries: Vec::new(),
        }
    }

    /// Main event loop.
    ///
    /// Returns the summaries of every run that finished, in order. A missing
    /// server binary ends the loop with `DevpipeError::MissingBinary`.
    pub async fn run(mut self) -> Result<Vec<RunSummary>> {
        info!("devpipe runtime started");

        let result = self.event_loop().await;

        if let Err(e) = self.executor.shutdown().await {
            warn!(error = %e, "executor shutdown failed");
        }

        info!("runtime exiting");
        result.map(|()| self.summaries)
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("runtime event channel closed; exiting");
                return Ok(());
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                return Ok(());
            }
        }
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await,
            CoreCommand::ReportRun(summary) => {
                log_summary(&summary);
                self.summaries.push(summary);
                Ok(())
            }
            CoreCommand::AbortMissingBinary { task, program } => {
                error!(task = %task, program = %program, "supervised binary is missing; aborting");
                Err(DevpipeError::MissingBinary(program))
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
                Ok(())
            }
        }
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, run_id = tasks[0].run_id, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}

fn log_summary(summary: &RunSummary) {
    if summary.is_success() && summary.with_errors.is_empty() {
        info!(run_id = summary.run_id, tasks = ?summary.succeeded, "run succeeded");
        return;
    }
    for (task, n) in &summary.with_errors {
        warn!(run_id = summary.run_id, task = %task, errors = n, "task completed with errors");
    }
    if !summary.failed.is_empty() {
        error!(run_id = summary.run_id, failed = ?summary.failed, skipped = ?summary.skipped, "run failed");
    }
}
