// src/notifier.rs

//! User-facing notifications for build errors.
//!
//! The desktop notification mechanism itself is an external program; devpipe
//! only decides *when* to notify and with which title/message.

use std::fmt::Debug;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync + Debug {
    fn notify(&self, title: &str, message: &str);
}

/// Notifier that only writes a log line. Used when no `[notify].cmd` is set.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        warn!(target: "devpipe::notify", "{title}: {message}");
    }
}

/// Notifier that runs an external program as `<program> <title> <message>`,
/// e.g. `notify-send`. Fire-and-forget: failures are logged, never surfaced.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, message: &str) {
        let mut cmd = Command::new(&self.program);
        cmd.arg(title)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let program = self.program.clone();
        match cmd.spawn() {
            Ok(mut child) => {
                tokio::spawn(async move {
                    if let Err(e) = child.wait().await {
                        debug!(program = %program, error = %e, "notifier process wait failed");
                    }
                });
            }
            Err(e) => {
                warn!(program = %program, error = %e, "failed to run notifier; falling back to log");
                LogNotifier.notify(title, message);
            }
        }
    }
}
