use devpipe::config::model::{
    ConfigFile, PipelineConfig, RawConfigFile, ServerConfig, StageConfig, StageKind, TaskConfig,
    WatchRuleConfig,
};
use devpipe::env::Environment;
use devpipe::errors::Result;
use devpipe::types::TriggerWhileRunningBehaviour;

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Debug, Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_server(mut self, cmd: &str, args: &[&str], dev_flag: Option<&str>) -> Self {
        self.config.server = Some(ServerConfig {
            cmd: cmd.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            dev_flag: dev_flag.map(str::to_string),
            reload_path: "/".to_string(),
        });
        self
    }

    pub fn with_watch(mut self, patterns: &[&str], tasks: &[&str]) -> Self {
        self.config.watch.push(WatchRuleConfig {
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_default_tasks(mut self, tasks: &[&str]) -> Self {
        self.config.config.default_tasks = tasks.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_behaviour(mut self, behaviour: TriggerWhileRunningBehaviour, queue_length: usize) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self.config.config.queue_length = queue_length;
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

/// Builder for `TaskConfig`. Starts as a group task with no action.
#[derive(Debug, Default)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn pipeline(mut self, src: &[&str], dest: &str, stages: Vec<StageConfig>) -> Self {
        self.task.pipeline.push(PipelineConfig {
            src: src.iter().map(|s| s.to_string()).collect(),
            dest: dest.to_string(),
            stages,
        });
        self
    }

    pub fn clean(mut self, dir: &str) -> Self {
        self.task.clean.push(dir.to_string());
        self
    }

    pub fn spawn(mut self) -> Self {
        self.task.spawn = true;
        self
    }

    pub fn reload(mut self) -> Self {
        self.task.reload = true;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

pub fn concat_stage(file: &str) -> StageConfig {
    StageConfig {
        kind: StageKind::Concat {
            file: file.to_string(),
            separator: "\n".to_string(),
        },
        when: None,
        unless: None,
    }
}

pub fn command_stage(cmd: &str) -> StageConfig {
    StageConfig {
        kind: StageKind::Command {
            cmd: cmd.to_string(),
        },
        when: None,
        unless: None,
    }
}

/// Gate a stage to `env` only.
pub fn when(env: Environment, mut stage: StageConfig) -> StageConfig {
    stage.when = Some(env);
    stage
}

/// Gate a stage to every environment except `env`.
pub fn unless(env: Environment, mut stage: StageConfig) -> StageConfig {
    stage.unless = Some(env);
    stage
}
