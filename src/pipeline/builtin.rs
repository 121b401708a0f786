// src/pipeline/builtin.rs

//! Stages that can be named in the config.
//!
//! Real asset tooling (minifiers, source-map writers, font fetchers) is
//! connected through [`CommandStage`]: devpipe feeds each file to the
//! program's stdin and takes its stdout as the new contents.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};

use crate::config::model::{StageConfig, StageKind};
use crate::env::Gate;
use crate::pipeline::{FileRecord, FileTransform, PerFile, Stage, StageOutput, Transform};

/// Concatenate every file in the batch into one output file.
#[derive(Debug, Clone)]
pub struct Concat {
    file: String,
    separator: String,
}

impl Concat {
    pub fn new(file: impl Into<String>) -> Self {
        Self::with_separator(file, "\n")
    }

    pub fn with_separator(file: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            separator: separator.into(),
        }
    }
}

impl Transform for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply(&self, files: Vec<FileRecord>) -> StageOutput {
        if files.is_empty() {
            return StageOutput::default();
        }

        let mut contents = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&file.contents);
        }

        StageOutput::from_files(vec![FileRecord::new(
            PathBuf::from(&self.file),
            PathBuf::from(&self.file),
            contents,
        )])
    }
}

/// Pipe each file through a shell command.
///
/// The command sees the file on stdin and `DEVPIPE_FILE` set to the file's
/// relative path. A non-zero exit fails only that file, with the command's
/// stderr as the message.
#[derive(Debug, Clone)]
pub struct CommandStage {
    cmd: String,
    name: String,
}

impl CommandStage {
    pub fn new(cmd: impl Into<String>) -> Self {
        let cmd = cmd.into();
        let name = cmd
            .split_whitespace()
            .next()
            .unwrap_or("command")
            .to_string();
        Self { cmd, name }
    }
}

impl FileTransform for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, mut file: FileRecord) -> Result<FileRecord> {
        let mut child = shell(&self.cmd)
            .env("DEVPIPE_FILE", &file.relative)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning `{}`", self.cmd))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("no stdin pipe for `{}`", self.cmd))?;
        let input = std::mem::take(&mut file.contents);

        // Feed stdin from another thread so a chatty child can't deadlock us.
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for `{}`", self.cmd))?;
        match writer.join() {
            Ok(Ok(())) => {}
            // The child may legitimately stop reading early.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e).context("writing file to stdin"),
            Err(_) => bail!("stdin writer thread panicked"),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.is_empty() {
                bail!("`{}` exited with {}", self.cmd, output.status);
            }
            bail!("{stderr}");
        }

        file.contents = output.stdout;
        Ok(file)
    }
}

fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Build a [`Stage`] from its validated config entry.
pub fn stage_from_config(cfg: &StageConfig) -> Stage {
    let stage = match &cfg.kind {
        StageKind::Concat { file, separator } => {
            Stage::always(Concat::with_separator(file.clone(), separator.clone()))
        }
        StageKind::Command { cmd } => Stage::always(PerFile(CommandStage::new(cmd.clone()))),
    };

    let gate = match (cfg.when, cfg.unless) {
        (Some(env), _) => Some(Gate::When(env)),
        (None, Some(env)) => Some(Gate::Unless(env)),
        (None, None) => None,
    };
    stage.gated(gate)
}
