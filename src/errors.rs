// src/errors.rs

//! Crate-wide error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevpipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task registered twice: {0}")]
    DuplicateTask(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    /// The supervised server executable does not exist. Always fatal.
    #[error("Supervised binary not found: {0}")]
    MissingBinary(String),

    /// A `--once` run ended with failed or skipped tasks.
    #[error("Run failed: failed {failed:?}, skipped {skipped:?}")]
    RunFailed {
        failed: Vec<String>,
        skipped: Vec<String>,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevpipeError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DevpipeError::ConfigError(_)
            | DevpipeError::TaskNotFound(_)
            | DevpipeError::DuplicateTask(_)
            | DevpipeError::DagCycle(_)
            | DevpipeError::TomlError(_) => 2,
            DevpipeError::MissingBinary(_) => 127,
            DevpipeError::RunFailed { .. }
            | DevpipeError::IoError(_)
            | DevpipeError::Other(_) => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevpipeError>;
