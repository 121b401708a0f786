// src/types.rs

use std::fmt;

use serde::Deserialize;

/// What happens to a trigger for a task that already started in the active
/// run.
///
/// - `Queue`: remember it and start another run when the current one
///   finishes, coalescing repeated triggers (default).
/// - `Cancel`: keep only the latest pending trigger. The active run itself
///   is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

/// Origin stream of supervised-process output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}
