// src/supervisor/mod.rs

//! Supervision of the development server process.
//!
//! At most one server runs at a time. [`Supervisor::spawn`] terminates the
//! previous instance before launching the next. Stdout is split into lines
//! for the [`LogSink`]; stderr is relayed raw. The first stdout bytes of each
//! spawn trigger exactly one reload broadcast. A server that closes its
//! stdout counts as `Stopped` and stays down until the next `spawn`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::config::model::ServerConfig;
use crate::env::Environment;
use crate::reload::ReloadBroadcaster;

pub mod lines;
pub mod log;
pub mod process;

pub use lines::LineSplitter;
pub use log::{ConsoleLogSink, LogLine, LogSink};
pub use process::{CommandLauncher, LaunchedProcess, ProcessHandle, ProcessLauncher};

const READ_BUF: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    #[default]
    Stopped,
    /// Launched, no stdout seen yet.
    Starting,
    /// Produced its first stdout bytes.
    Running,
}

#[derive(Debug, Default)]
struct Shared {
    /// Bumped on every spawn and kill; output readers of older generations
    /// never touch the state.
    generation: u64,
    state: SupervisorState,
}

/// Owner of the single supervised process handle.
pub struct Supervisor {
    server: ServerConfig,
    env: Environment,
    /// Working directory of the server; the project root.
    root: PathBuf,
    launcher: Arc<dyn ProcessLauncher>,
    broadcaster: Arc<dyn ReloadBroadcaster>,
    sink: Arc<dyn LogSink>,
    current: Option<Box<dyn ProcessHandle>>,
    shared: Arc<Mutex<Shared>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("cmd", &self.server.cmd)
            .field("env", &self.env)
            .field("root", &self.root)
            .field("current", &self.current)
            .field("state", &self.state())
            .finish()
    }
}

impl Supervisor {
    pub fn new(
        server: ServerConfig,
        env: Environment,
        root: impl Into<PathBuf>,
        launcher: Arc<dyn ProcessLauncher>,
        broadcaster: Arc<dyn ReloadBroadcaster>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            server,
            env,
            root: root.into(),
            launcher,
            broadcaster,
            sink,
            current: None,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Executable being supervised.
    pub fn program(&self) -> &str {
        &self.server.cmd
    }

    pub fn state(&self) -> SupervisorState {
        lock(&self.shared).state
    }

    /// Launch the server, terminating the previous instance first.
    ///
    /// The returned error is the launcher's; `NotFound` means the executable
    /// is missing.
    pub fn spawn(&mut self) -> io::Result<()> {
        self.stop_current();

        let args = self.server.args_for(self.env);
        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = SupervisorState::Starting;
            shared.generation
        };

        let launched = match self.launcher.launch(&self.server.cmd, &args, &self.root) {
            Ok(p) => p,
            Err(e) => {
                lock(&self.shared).state = SupervisorState::Stopped;
                return Err(e);
            }
        };

        debug!(cmd = %self.server.cmd, ?args, root = ?self.root, generation, "spawned server");

        tokio::spawn(read_stdout(
            launched.stdout,
            generation,
            Arc::clone(&self.shared),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.sink),
            self.server.reload_path.clone(),
        ));
        tokio::spawn(relay_stderr(launched.stderr, Arc::clone(&self.sink)));

        self.current = Some(launched.handle);
        Ok(())
    }

    /// Terminate the server, if one is running.
    pub fn kill(&mut self) {
        if self.current.is_some() {
            info!(cmd = %self.server.cmd, "stopping server");
        }
        self.stop_current();
    }

    fn stop_current(&mut self) {
        if let Some(mut handle) = self.current.take() {
            debug!(pid = ?handle.id(), "terminating previous server");
            handle.terminate();
        }
        let mut shared = lock(&self.shared);
        shared.generation += 1;
        shared.state = SupervisorState::Stopped;
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_stdout(
    mut stdout: Box<dyn AsyncRead + Send + Unpin>,
    generation: u64,
    shared: Arc<Mutex<Shared>>,
    broadcaster: Arc<dyn ReloadBroadcaster>,
    sink: Arc<dyn LogSink>,
    reload_path: String,
) {
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_BUF];
    let mut seen_output = false;

    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "reading server stdout failed");
                break;
            }
        };

        if !seen_output {
            seen_output = true;
            let current = {
                let mut s = lock(&shared);
                let current = s.generation == generation;
                if current {
                    s.state = SupervisorState::Running;
                }
                current
            };
            if current {
                broadcaster.broadcast(&reload_path);
            }
        }

        for text in splitter.push(&buf[..n]) {
            sink.line(LogLine::stdout(text));
        }
    }

    if let Some(text) = splitter.finish() {
        sink.line(LogLine::stdout(text));
    }

    let mut s = lock(&shared);
    if s.generation == generation {
        s.state = SupervisorState::Stopped;
        info!(generation, "server output closed; stopped until the next spawn");
    } else {
        debug!(generation, "stdout of a replaced server closed");
    }
}

async fn relay_stderr(mut stderr: Box<dyn AsyncRead + Send + Unpin>, sink: Arc<dyn LogSink>) {
    let mut buf = vec![0u8; READ_BUF];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => sink.stderr(&buf[..n]),
            Err(e) => {
                warn!(error = %e, "reading server stderr failed");
                break;
            }
        }
    }
}
