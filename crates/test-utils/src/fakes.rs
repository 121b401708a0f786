//! Recording collaborators and a scripted process launcher.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use devpipe::notifier::Notifier;
use devpipe::reload::ReloadBroadcaster;
use devpipe::supervisor::{LaunchedProcess, LogLine, LogSink, ProcessHandle, ProcessLauncher};
use tokio::io::DuplexStream;

/// Remembers every `broadcast` path.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    paths: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.paths.lock().unwrap().len()
    }
}

impl ReloadBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

/// Remembers every `(title, message)` notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Collects server stdout lines and raw stderr bytes.
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    lines: Mutex<Vec<LogLine>>,
    stderr: Mutex<Vec<u8>>,
}

impl RecordingLogSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.text.clone())
            .collect()
    }

    pub fn stderr(&self) -> Vec<u8> {
        self.stderr.lock().unwrap().clone()
    }
}

impl LogSink for RecordingLogSink {
    fn line(&self, line: LogLine) {
        self.lines.lock().unwrap().push(line);
    }

    fn stderr(&self, bytes: &[u8]) {
        self.stderr.lock().unwrap().extend_from_slice(bytes);
    }
}

/// Write ends of a fake process's output pipes. Dropping them closes the
/// streams.
#[derive(Debug)]
pub struct FakeProcessIo {
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
}

#[derive(Debug, Default)]
struct LauncherState {
    launches: Vec<(String, Vec<String>)>,
    dirs: Vec<PathBuf>,
    terminated: Vec<u32>,
    io: Vec<Option<FakeProcessIo>>,
}

/// Launcher that hands out in-memory pipes instead of real processes.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
    missing: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose executable does not exist.
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::default()
        }
    }

    /// `(program, args)` of every launch, in order.
    pub fn launches(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().launches.clone()
    }

    /// Working directory of every launch, in order.
    pub fn launch_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().dirs.clone()
    }

    /// Pids (1-based launch index) of terminated processes, in order.
    pub fn terminated(&self) -> Vec<u32> {
        self.state.lock().unwrap().terminated.clone()
    }

    /// Take the pipe ends of the `n`th launch (0-based).
    pub fn take_io(&self, n: usize) -> Option<FakeProcessIo> {
        self.state.lock().unwrap().io.get_mut(n).and_then(Option::take)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, program: &str, args: &[String], cwd: &Path) -> io::Result<LaunchedProcess> {
        if self.missing {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{program}: not found"),
            ));
        }

        let (stdout_w, stdout_r) = tokio::io::duplex(4096);
        let (stderr_w, stderr_r) = tokio::io::duplex(4096);

        let mut state = self.state.lock().unwrap();
        state.launches.push((program.to_string(), args.to_vec()));
        state.dirs.push(cwd.to_path_buf());
        state.io.push(Some(FakeProcessIo {
            stdout: stdout_w,
            stderr: stderr_w,
        }));
        let pid = state.launches.len() as u32;

        Ok(LaunchedProcess {
            handle: Box::new(FakeHandle {
                pid,
                state: Arc::clone(&self.state),
                terminated: false,
            }),
            stdout: Box::new(stdout_r),
            stderr: Box::new(stderr_r),
        })
    }
}

#[derive(Debug)]
struct FakeHandle {
    pid: u32,
    state: Arc<Mutex<LauncherState>>,
    terminated: bool,
}

impl ProcessHandle for FakeHandle {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.state.lock().unwrap().terminated.push(self.pid);
        }
    }
}
