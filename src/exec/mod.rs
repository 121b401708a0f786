// src/exec/mod.rs

//! Task execution layer.
//!
//! Runs the actions of scheduled tasks and reports back to the runtime via
//! `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop, including the process
//!   supervisor; every spawn and kill happens on that one task.
//! - [`task_runner`] runs the build actions of one task (command, pipelines,
//!   clean) concurrently and folds them into a `TaskOutcome`.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` used in production, which tests replace with a
//!   fake implementation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::env::Environment;
use crate::fs::FileSystem;
use crate::notifier::Notifier;
use crate::pipeline::WriteCache;
use crate::reload::ReloadBroadcaster;

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{BackendFuture, ExecutorBackend, RealExecutorBackend};
pub use executor_loop::{spawn_executor, ExecutorMessage};

/// Everything a task run needs besides the task itself.
#[derive(Debug, Clone)]
pub struct ExecutorContext {
    /// Directory that relative paths in the config resolve against.
    pub root: PathBuf,
    pub env: Environment,
    pub fs: Arc<dyn FileSystem>,
    pub notifier: Arc<dyn Notifier>,
    pub broadcaster: Arc<dyn ReloadBroadcaster>,
    pub cache: Arc<WriteCache>,
}
