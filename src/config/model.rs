// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::env::Environment;
use crate::types::TriggerWhileRunningBehaviour;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_tasks = ["static:build"]
///
/// [server]
/// cmd = "./OBIJudge"
/// args = ["run"]
/// dev_flag = "-testing"
///
/// [task."static:css"]
/// [[task."static:css".pipeline]]
/// src = ["static/src/*.css"]
/// dest = "static/dist"
/// stages = [{ kind = "concat", file = "obijudge.css" }]
///
/// [[watch]]
/// patterns = ["static/src/*"]
/// tasks = ["static:css"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// The supervised server process, if any.
    #[serde(default)]
    pub server: Option<ServerConfig>,

    #[serde(default)]
    pub livereload: LiveReloadConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// `[[watch]]` rules.
    #[serde(default)]
    pub watch: Vec<WatchRuleConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    server: Option<ServerConfig>,
    livereload: LiveReloadConfig,
    notify: NotifyConfig,
    task: BTreeMap<String, TaskConfig>,
    watch: Vec<WatchRuleConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            livereload: raw.livereload,
            notify: raw.notify,
            task: raw.task,
            watch: raw.watch,
        }
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.config
    }

    pub fn server(&self) -> Option<&ServerConfig> {
        self.server.as_ref()
    }

    pub fn livereload(&self) -> &LiveReloadConfig {
        &self.livereload
    }

    pub fn notify(&self) -> &NotifyConfig {
        &self.notify
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn watch_rules(&self) -> &[WatchRuleConfig] {
        &self.watch
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"queue"` (default) or `"cancel"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued reruns to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Window in which filesystem events are coalesced into one trigger.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Tasks to run when none are given on the command line.
    #[serde(default)]
    pub default_tasks: Vec<String>,
}

fn default_queue_length() -> usize {
    1
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
            debounce_ms: default_debounce_ms(),
            default_tasks: Vec::new(),
        }
    }
}

/// `[server]` section: the supervised development server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Executable to launch (not run through a shell).
    pub cmd: String,

    /// Fixed arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra flag appended whenever the environment is not production.
    #[serde(default)]
    pub dev_flag: Option<String>,

    /// Path passed to the reload broadcaster after each spawn.
    #[serde(default = "default_reload_path")]
    pub reload_path: String,
}

fn default_reload_path() -> String {
    "/".to_string()
}

impl ServerConfig {
    /// Argument list for `env`.
    pub fn args_for(&self, env: Environment) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(flag) = env.unless(Environment::Production, self.dev_flag.as_ref()).flatten() {
            args.push(flag.clone());
        }
        args
    }
}

/// `[livereload]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveReloadConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_livereload_host")]
    pub host: String,

    #[serde(default = "default_livereload_port")]
    pub port: u16,
}

fn default_livereload_host() -> String {
    "127.0.0.1".to_string()
}

fn default_livereload_port() -> u16 {
    crate::reload::DEFAULT_PORT
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_livereload_host(),
            port: default_livereload_port(),
        }
    }
}

/// `[notify]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    /// Program invoked as `<cmd> <title> <message>` (e.g. `notify-send`).
    /// When absent, notifications are only logged.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// `[task.<name>]` section.
///
/// A task may combine `cmd`, `pipeline` and `clean`; they run concurrently.
/// `spawn` stands alone. A task with no action at all is a group whose only
/// purpose is its `after` list.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shell command to run.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Asset pipelines (`[[task.<name>.pipeline]]`).
    #[serde(default)]
    pub pipeline: Vec<PipelineConfig>,

    /// Directories to remove recursively.
    #[serde(default)]
    pub clean: Vec<String>,

    /// (Re)spawn the supervised server.
    #[serde(default)]
    pub spawn: bool,

    /// Broadcast a reload after this task succeeds.
    #[serde(default)]
    pub reload: bool,
}

/// One `[[task.<name>.pipeline]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub src: Vec<String>,
    pub dest: String,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

/// One stage of a pipeline, optionally gated on the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(flatten)]
    pub kind: StageKind,

    /// Apply only in this environment.
    #[serde(default)]
    pub when: Option<Environment>,

    /// Apply in every environment except this one.
    #[serde(default)]
    pub unless: Option<Environment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageKind {
    Concat {
        file: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Command {
        cmd: String,
    },
}

fn default_separator() -> String {
    "\n".to_string()
}

/// One `[[watch]]` rule.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchRuleConfig {
    pub patterns: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Tasks run as one group when any pattern matches.
    pub tasks: Vec<String>,
}
