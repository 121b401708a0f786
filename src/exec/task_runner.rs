// src/exec/task_runner.rs

//! Runner for the build actions of a single task.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::ExecutorContext;
use crate::pipeline::{self, report_file_errors, PipelineReport};

/// Run one task and send its `TaskCompleted` event.
pub async fn run_task(
    task: ScheduledTask,
    ctx: Arc<ExecutorContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let outcome = run_actions(&task, &ctx).await;

    info!(task = %task.name, run_id = task.run_id, ?outcome, "task finished");

    if outcome.satisfies_dependents() && task.action.reload {
        broadcast_reload(&task, &ctx, &outcome);
    }

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome: outcome.outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name, "runtime gone; dropping completion");
    }
}

/// Folded result of every action of one task.
#[derive(Debug)]
struct ActionsOutcome {
    outcome: TaskOutcome,
    /// Files written by pipelines, relative to the project root.
    written: Vec<PathBuf>,
}

impl ActionsOutcome {
    fn satisfies_dependents(&self) -> bool {
        self.outcome.satisfies_dependents()
    }
}

async fn run_actions(task: &ScheduledTask, ctx: &Arc<ExecutorContext>) -> ActionsOutcome {
    let action = &task.action;

    if action.is_group() {
        debug!(task = %task.name, "group task; nothing to run");
        return ActionsOutcome {
            outcome: TaskOutcome::Success,
            written: Vec::new(),
        };
    }

    let cmd_fut = async {
        match &action.cmd {
            Some(cmd) => run_shell(&task.name, cmd, &ctx.root).await,
            None => Ok(0),
        }
    };
    let pipelines_fut = run_pipelines(task, ctx);
    let clean_fut = run_clean(task, ctx);

    let (cmd_res, reports, clean_res) = tokio::join!(cmd_fut, pipelines_fut, clean_fut);

    let mut failure: Option<i32> = None;

    match cmd_res {
        Ok(0) => {}
        Ok(code) => {
            warn!(task = %task.name, exit_code = code, "command failed");
            failure = Some(code);
        }
        Err(e) => {
            error!(task = %task.name, error = %format!("{e:#}"), "command could not run");
            failure = Some(-1);
        }
    }

    if let Err(e) = clean_res {
        error!(task = %task.name, error = %format!("{e:#}"), "clean failed");
        failure.get_or_insert(1);
    }

    let mut written = Vec::new();
    let mut file_errors = Vec::new();
    for report in reports {
        match report {
            Ok(r) => {
                debug!(
                    task = %task.name,
                    written = r.written.len(),
                    unchanged = r.unchanged,
                    errors = r.errors.len(),
                    "pipeline finished"
                );
                written.extend(
                    r.written
                        .into_iter()
                        .map(|p| p.strip_prefix(&ctx.root).map(Path::to_path_buf).unwrap_or(p)),
                );
                file_errors.extend(r.errors);
            }
            Err(e) => {
                error!(task = %task.name, error = %format!("{e:#}"), "pipeline aborted");
                failure.get_or_insert(-1);
            }
        }
    }

    let reported = report_file_errors(&task.name, &file_errors, ctx.notifier.as_ref());

    let outcome = match failure {
        Some(code) => TaskOutcome::Failed(code),
        None if reported > 0 => TaskOutcome::CompletedWithErrors(reported),
        None => TaskOutcome::Success,
    };

    ActionsOutcome { outcome, written }
}

async fn run_pipelines(task: &ScheduledTask, ctx: &Arc<ExecutorContext>) -> Vec<Result<PipelineReport>> {
    let runs = task.action.pipelines.iter().cloned().map(|spec| {
        let ctx = Arc::clone(ctx);
        async move {
            tokio::task::spawn_blocking(move || {
                pipeline::execute(ctx.fs.as_ref(), &ctx.root, ctx.env, &spec, &ctx.cache)
            })
            .await
            .context("pipeline worker panicked")
        }
    });
    join_all(runs).await
}

async fn run_clean(task: &ScheduledTask, ctx: &Arc<ExecutorContext>) -> Result<()> {
    if task.action.clean.is_empty() {
        return Ok(());
    }

    let dirs: Vec<PathBuf> = task.action.clean.iter().map(|d| ctx.root.join(d)).collect();
    let ctx = Arc::clone(ctx);

    tokio::task::spawn_blocking(move || -> Result<()> {
        for dir in &dirs {
            ctx.fs.remove_dir_all(dir)?;
            ctx.cache.invalidate_under(dir);
            info!(dir = ?dir, "cleaned");
        }
        Ok(())
    })
    .await
    .context("clean worker panicked")?
}

/// Run `cmd` through the platform shell, logging its output. Returns the
/// exit code (`-1` when killed by a signal).
async fn run_shell(task: &str, cmd: &str, cwd: &Path) -> Result<i32> {
    info!(task = %task, cmd = %cmd, "running command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    let mut child = command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning `{cmd}` for task '{task}'"))?;

    let out = child.stdout.take().map(|s| log_lines(task.to_string(), s, false));
    let err = child.stderr.take().map(|s| log_lines(task.to_string(), s, true));

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{cmd}` of task '{task}'"))?;

    for handle in [out, err].into_iter().flatten() {
        let _ = handle.await;
    }

    Ok(status.code().unwrap_or(-1))
}

fn log_lines<R>(task: String, stream: R, is_stderr: bool) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                warn!(task = %task, "{}", line);
            } else {
                info!(task = %task, "{}", line);
            }
        }
    })
}

fn broadcast_reload(task: &ScheduledTask, ctx: &ExecutorContext, outcome: &ActionsOutcome) {
    if task.action.pipelines.is_empty() {
        ctx.broadcaster.broadcast("/");
        return;
    }
    if outcome.written.is_empty() {
        debug!(task = %task.name, "no outputs changed; skipping reload");
        return;
    }
    for path in &outcome.written {
        ctx.broadcaster.broadcast(&reload_path(path));
    }
}

/// Root-relative, slash-separated path as browsers see it.
fn reload_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_paths_are_rooted() {
        assert_eq!(
            reload_path(Path::new("static/dist/obijudge.css")),
            "/static/dist/obijudge.css"
        );
    }
}
