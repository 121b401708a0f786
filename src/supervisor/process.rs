// src/supervisor/process.rs

//! Launching and terminating the supervised OS process.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Handle to a launched process.
pub trait ProcessHandle: Send + Debug {
    fn id(&self) -> Option<u32>;

    /// Ask the process to stop. Does not wait for it to exit.
    fn terminate(&mut self);
}

/// A freshly launched process with its output pipes.
pub struct LaunchedProcess {
    pub handle: Box<dyn ProcessHandle>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
}

impl Debug for LaunchedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Starts processes. Swapped for a fake in tests.
pub trait ProcessLauncher: Send + Sync + Debug {
    /// Start `program` with `args` directly (no shell) inside `cwd`. A
    /// relative `program` resolves against `cwd`. An `io::ErrorKind::NotFound`
    /// error means the executable does not exist.
    fn launch(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<LaunchedProcess>;
}

/// Launcher backed by `tokio::process`.
///
/// The child is owned by a reaper task that logs its exit and, when asked to
/// stop, signals it. Only the reaper signals, so the pid is never stale.
/// Nothing is restarted when the process dies on its own.
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<LaunchedProcess> {
        let mut child = Command::new(resolve_program(program, cwd))
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child has no stdout pipe"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child has no stderr pipe"))?;

        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let name = program.to_string();

        info!(program = %name, ?args, pid, "server started");

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => warn!(program = %name, pid, %status, "server exited; not restarting"),
                    Err(e) => warn!(program = %name, pid, error = %e, "failed to wait for server"),
                },
                _ = stop_rx => {
                    match child.try_wait() {
                        Ok(None) => stop_child(&mut child, &name),
                        Ok(Some(status)) => debug!(program = %name, pid, %status, "server already exited"),
                        Err(e) => warn!(program = %name, pid, error = %e, "failed to poll server"),
                    }
                    match child.wait().await {
                        Ok(status) => debug!(program = %name, pid, %status, "server stopped"),
                        Err(e) => warn!(program = %name, pid, error = %e, "failed to reap server"),
                    }
                }
            }
        });

        Ok(LaunchedProcess {
            handle: Box::new(ChildHandle {
                pid,
                stop: Some(stop_tx),
            }),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        })
    }
}

/// Relative programs with a directory part (`./OBIJudge`, `bin/server`) are
/// made absolute under `cwd`; bare names go through `PATH`.
fn resolve_program(program: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        let joined = cwd.join(path);
        std::path::absolute(&joined).unwrap_or(joined)
    } else {
        path.to_path_buf()
    }
}

/// Ask a live, not yet reaped child to stop: SIGTERM on unix, kill elsewhere.
fn stop_child(child: &mut tokio::process::Child, name: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: the child is still owned and unreaped, so `pid` is ours.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            debug!(program = %name, pid, error = %io::Error::last_os_error(), "SIGTERM failed");
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = child.start_kill() {
        warn!(program = %name, error = %e, "failed to kill server");
    }
}

#[derive(Debug)]
struct ChildHandle {
    pid: Option<u32>,
    /// Tells the reaper to stop the child.
    stop: Option<oneshot::Sender<()>>,
}

impl ProcessHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Receiver gone means the reaper already saw the exit.
            let _ = stop.send(());
        }
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}
