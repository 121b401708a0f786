// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `devpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devpipe",
    version,
    about = "Build web assets through a task graph, watch sources, and supervise the dev server.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to run as one concurrent group.
    ///
    /// If omitted, `[config].default_tasks` is used.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Devpipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Run the requested tasks once and exit; no watching or supervising.
    ///
    /// The exit code is non-zero if any task failed or was skipped.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print tasks, stages and watch rules, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print task names with their dependencies and exit.
    #[arg(long)]
    pub list: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_tasks_and_flags() {
        let args = CliArgs::parse_from(["devpipe", "--once", "static:js", "static:css"]);
        assert!(args.once);
        assert_eq!(args.tasks, vec!["static:js", "static:css"]);
        assert_eq!(args.config, "Devpipe.toml");
    }
}
