// src/exec/backend.rs

//! The seam between the runtime and whatever actually runs tasks.

use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{DevpipeError, Result};
use crate::exec::ExecutorContext;
use crate::exec::executor_loop::{ExecutorMessage, spawn_executor};
use crate::supervisor::Supervisor;

/// Boxed future returned by [`ExecutorBackend`] methods.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Receives ready tasks from the runtime. Completions come back as
/// `RuntimeEvent::TaskCompleted` on the runtime channel, not as return values.
pub trait ExecutorBackend: Send {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_>;

    /// Release long-lived resources such as the supervised server. The
    /// runtime calls this exactly once, on its way out.
    fn shutdown(&mut self) -> BackendFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// Hands tasks to the executor loop, which owns the [`Supervisor`].
#[derive(Debug)]
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ExecutorMessage>,
}

impl RealExecutorBackend {
    pub fn new(
        ctx: ExecutorContext,
        supervisor: Option<Supervisor>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            tx: spawn_executor(ctx, supervisor, runtime_tx),
        }
    }
}

fn loop_gone() -> DevpipeError {
    DevpipeError::Other(anyhow!("executor loop has stopped"))
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        Box::pin(async move {
            for task in tasks {
                self.tx
                    .send(ExecutorMessage::Run(task))
                    .await
                    .map_err(|_| loop_gone())?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            let (ack_tx, ack_rx) = oneshot::channel();
            if self.tx.send(ExecutorMessage::Shutdown(ack_tx)).await.is_err() {
                return Ok(());
            }
            ack_rx.await.map_err(|_| loop_gone())
        })
    }
}
