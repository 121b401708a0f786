// src/supervisor/log.rs

use std::fmt::Debug;
use std::io::Write;

use tracing::{info, warn};

use crate::types::OutputStream;

/// One line of supervised-process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stream: OutputStream,
    pub text: String,
}

impl LogLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }
}

/// Where the supervised server's output goes.
pub trait LogSink: Send + Sync + Debug {
    /// A complete, non-empty stdout line.
    fn line(&self, line: LogLine);

    /// Raw stderr bytes, relayed as they arrive.
    fn stderr(&self, bytes: &[u8]);
}

/// Logs stdout lines through `tracing` and copies stderr to our own stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn line(&self, line: LogLine) {
        info!(target: "devpipe::server", stream = %line.stream, "{}", line.text);
    }

    fn stderr(&self, bytes: &[u8]) {
        let mut err = std::io::stderr().lock();
        if let Err(e) = err.write_all(bytes).and_then(|_| err.flush()) {
            warn!(error = %e, "failed to relay server stderr");
        }
    }
}
