// src/logging.rs

//! `tracing` subscriber setup.
//!
//! `--log-level` wins when given. Otherwise `DEVPIPE_LOG` is read as a full
//! `EnvFilter` directive string (`"debug"`, `"devpipe::watch=trace,info"`).
//! Without either, `info` is used. Output goes to stderr so that `--list` and
//! `--dry-run` output on stdout stays clean.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV_VAR: &str = "DEVPIPE_LOG";

/// Dependencies that are chatty at `debug` and below.
const QUIET_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "notify", "globset"];

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing tracing subscriber")
}

fn build_filter(cli_level: Option<LogLevel>, env_directives: Option<&str>) -> Result<EnvFilter> {
    let base = match (cli_level, env_directives.map(str::trim)) {
        (Some(lvl), _) => level_name(lvl).to_string(),
        (None, Some(d)) if !d.is_empty() => d.to_string(),
        _ => "info".to_string(),
    };

    let mut filter = EnvFilter::try_new(&base)
        .with_context(|| format!("invalid {LOG_ENV_VAR} directives: {base:?}"))?;
    if !base.contains("tungstenite") && !base.contains("notify") {
        for target in QUIET_TARGETS {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }
    Ok(filter)
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
