// src/pipeline/mod.rs

//! Asset pipelines.
//!
//! A pipeline reads a set of source files, passes them through an ordered
//! list of stages and writes the result to a destination directory. Each
//! stage is a plain function over an in-memory batch of [`FileRecord`]s.
//!
//! - [`source`] expands `src` globs and reads files, isolating per-file read
//!   failures.
//! - [`builtin`] provides the stages that can be named in the config.
//! - [`dest`] writes outputs, skipping files whose bytes did not change.
//! - [`report`] turns the collected [`FileError`]s into log lines and
//!   notifications once the task is done.
//!
//! Stages may carry an environment [`Gate`]. A gated-out stage is elided
//! before the batch reaches it, so the output is the same as if the stage had
//! never been listed.

use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::env::{Environment, Gate};
use crate::fs::FileSystem;

pub mod builtin;
pub mod dest;
pub mod report;
pub mod source;

pub use builtin::{CommandStage, Concat};
pub use dest::WriteCache;
pub use report::report_file_errors;

/// One file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Where the file came from, for diagnostics.
    pub source: PathBuf,
    /// Output location relative to the destination directory.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
}

impl FileRecord {
    pub fn new(
        source: impl Into<PathBuf>,
        relative: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            source: source.into(),
            relative: relative.into(),
            contents: contents.into(),
        }
    }
}

/// A single file's failure in a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub stage: String,
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error ({}): {}", self.stage, self.message)
    }
}

/// Files that made it through a stage plus the files that did not.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub files: Vec<FileRecord>,
    pub errors: Vec<FileError>,
}

impl StageOutput {
    pub fn from_files(files: Vec<FileRecord>) -> Self {
        Self {
            files,
            errors: Vec::new(),
        }
    }
}

/// A stage operating on the whole batch (e.g. concatenation).
pub trait Transform: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn apply(&self, files: Vec<FileRecord>) -> StageOutput;
}

/// A stage operating on one file at a time.
///
/// Wrap it in [`PerFile`] to use it as a [`Transform`]; a failing file is
/// then recorded and dropped while its siblings continue.
pub trait FileTransform: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn transform(&self, file: FileRecord) -> anyhow::Result<FileRecord>;
}

/// Adapter that isolates failures of a [`FileTransform`] per file.
#[derive(Debug, Clone)]
pub struct PerFile<T>(pub T);

impl<T: FileTransform> Transform for PerFile<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn apply(&self, files: Vec<FileRecord>) -> StageOutput {
        let mut out = StageOutput::default();
        for file in files {
            let path = file.source.clone();
            match self.0.transform(file) {
                Ok(done) => out.files.push(done),
                Err(e) => out.errors.push(FileError {
                    stage: self.0.name().to_string(),
                    path,
                    message: format!("{e:#}"),
                }),
            }
        }
        out
    }
}

/// A transform plus an optional environment condition.
#[derive(Clone)]
pub struct Stage {
    gate: Option<Gate>,
    transform: Arc<dyn Transform>,
}

impl Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.transform.name())
            .field("gate", &self.gate)
            .finish()
    }
}

impl Stage {
    /// An unconditional stage.
    pub fn always(transform: impl Transform + 'static) -> Self {
        Self {
            gate: None,
            transform: Arc::new(transform),
        }
    }

    /// A stage that only applies in `env`.
    pub fn when(env: Environment, transform: impl Transform + 'static) -> Self {
        Self::always(transform).gated(Some(Gate::When(env)))
    }

    /// A stage that applies in every environment except `env`.
    pub fn unless(env: Environment, transform: impl Transform + 'static) -> Self {
        Self::always(transform).gated(Some(Gate::Unless(env)))
    }

    pub fn gated(mut self, gate: Option<Gate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn name(&self) -> &str {
        self.transform.name()
    }

    pub fn gate(&self) -> Option<Gate> {
        self.gate
    }

    /// Whether this stage takes part in a pipeline running under `env`.
    pub fn participates(&self, env: Environment) -> bool {
        self.gate.is_none_or(|g| g.admits(env))
    }
}

/// Apply `stages` to `inputs` in declared order under `env`.
///
/// Gated-out stages are skipped without reordering the rest. Errors from
/// every stage are accumulated; files that failed are not seen by later
/// stages.
pub fn build(env: Environment, inputs: Vec<FileRecord>, stages: &[Stage]) -> StageOutput {
    let mut files = inputs;
    let mut errors = Vec::new();

    for stage in stages {
        if !stage.participates(env) {
            trace!(stage = stage.name(), %env, "stage gated out");
            continue;
        }
        let out = stage.transform.apply(files);
        debug!(
            stage = stage.name(),
            files = out.files.len(),
            errors = out.errors.len(),
            "stage applied"
        );
        files = out.files;
        errors.extend(out.errors);
    }

    StageOutput { files, errors }
}

/// A fully resolved pipeline: where to read, what to do, where to write.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Source globs, in order. A leading `!` excludes.
    pub src: Vec<String>,
    pub dest: PathBuf,
    pub stages: Vec<Stage>,
}

/// Outcome of executing one [`PipelineSpec`].
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub written: Vec<PathBuf>,
    pub unchanged: usize,
    pub errors: Vec<FileError>,
}

/// Read sources, run the stages, and write the outputs under `root`.
///
/// Never fails as a whole: every problem is attached to a file and returned
/// in [`PipelineReport::errors`].
pub fn execute(
    fs: &dyn FileSystem,
    root: &Path,
    env: Environment,
    spec: &PipelineSpec,
    cache: &WriteCache,
) -> PipelineReport {
    let read = source::read_sources(fs, root, &spec.src);
    let mut errors = read.errors;

    let built = build(env, read.files, &spec.stages);
    errors.extend(built.errors);

    let dest = root.join(&spec.dest);
    let written = dest::write_outputs(fs, &dest, built.files, cache);
    errors.extend(written.errors);

    PipelineReport {
        written: written.written,
        unchanged: written.unchanged,
        errors,
    }
}
