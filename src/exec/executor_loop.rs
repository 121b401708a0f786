// src/exec/executor_loop.rs

//! Main executor loop.

use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::task_runner::run_task;
use crate::exec::ExecutorContext;
use crate::supervisor::Supervisor;

/// Messages accepted by the executor loop.
#[derive(Debug)]
pub enum ExecutorMessage {
    Run(ScheduledTask),
    /// Kill the supervised server and stop; acknowledged once done.
    Shutdown(oneshot::Sender<()>),
}

/// Spawn the background executor loop.
///
/// Build tasks each run in their own Tokio task. Spawn tasks are handled
/// inline: the loop is the only owner of the [`Supervisor`], so spawns and
/// kills never overlap.
pub fn spawn_executor(
    ctx: ExecutorContext,
    mut supervisor: Option<Supervisor>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ExecutorMessage> {
    let (tx, mut rx) = mpsc::channel::<ExecutorMessage>(32);
    let ctx = Arc::new(ctx);

    tokio::spawn(async move {
        info!("executor loop started");

        while let Some(msg) = rx.recv().await {
            match msg {
                ExecutorMessage::Run(task) if task.action.spawn => {
                    handle_spawn(task, supervisor.as_mut(), &runtime_tx).await;
                }
                ExecutorMessage::Run(task) => {
                    let ctx = Arc::clone(&ctx);
                    let rt_tx = runtime_tx.clone();
                    let name = task.name.clone();
                    tokio::spawn(async move {
                        run_task(task, ctx, rt_tx).await;
                        debug!(task = %name, "task runner finished");
                    });
                }
                ExecutorMessage::Shutdown(ack) => {
                    if let Some(sup) = supervisor.as_mut() {
                        sup.kill();
                    }
                    let _ = ack.send(());
                    break;
                }
            }
        }

        if let Some(sup) = supervisor.as_mut() {
            sup.kill();
        }
        info!("executor loop finished");
    });

    tx
}

async fn handle_spawn(
    task: ScheduledTask,
    supervisor: Option<&mut Supervisor>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let event = match supervisor {
        None => {
            error!(task = %task.name, "spawn requested but no [server] is configured");
            RuntimeEvent::TaskCompleted {
                task: task.name,
                outcome: TaskOutcome::Failed(-1),
            }
        }
        Some(sup) => match sup.spawn() {
            Ok(()) => RuntimeEvent::TaskCompleted {
                task: task.name,
                outcome: TaskOutcome::Success,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!(task = %task.name, error = %e, "server executable not found");
                RuntimeEvent::BinaryMissing {
                    task: task.name,
                    program: sup.program().to_string(),
                }
            }
            Err(e) => {
                error!(task = %task.name, error = %e, "failed to spawn server");
                RuntimeEvent::TaskCompleted {
                    task: task.name,
                    outcome: TaskOutcome::Failed(e.raw_os_error().unwrap_or(-1)),
                }
            }
        },
    };

    if runtime_tx.send(event).await.is_err() {
        debug!("runtime gone; dropping spawn result");
    }
}
