// src/config/validate.rs

use globset::GlobBuilder;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, PipelineConfig, RawConfigFile, StageKind, TaskConfig};
use crate::errors::{DevpipeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevpipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_actions(cfg)?;
    validate_watch_rules(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> DevpipeError {
    DevpipeError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(config_error("[config].queue_length must be >= 1 (got 0)"));
    }

    for name in &cfg.config.default_tasks {
        if !cfg.task.contains_key(name) {
            return Err(config_error(format!(
                "[config].default_tasks references unknown task '{name}'"
            )));
        }
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(DevpipeError::DagCycle(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(DevpipeError::TaskNotFound(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DevpipeError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_actions(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.spawn {
            if has_build_action(task) {
                return Err(config_error(format!(
                    "task '{name}': `spawn` cannot be combined with `cmd`, `pipeline` or `clean`"
                )));
            }
            if cfg.server.is_none() {
                return Err(config_error(format!(
                    "task '{name}' sets `spawn = true` but there is no [server] section"
                )));
            }
        }

        if task.cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(config_error(format!("task '{name}': `cmd` is empty")));
        }

        for dir in &task.clean {
            if dir.trim().is_empty() {
                return Err(config_error(format!(
                    "task '{name}': `clean` contains an empty path"
                )));
            }
        }

        for (i, pipeline) in task.pipeline.iter().enumerate() {
            validate_pipeline(name, i, pipeline)?;
        }
    }

    if cfg.server.as_ref().is_some_and(|s| s.cmd.trim().is_empty()) {
        return Err(config_error("[server].cmd is empty"));
    }

    Ok(())
}

fn has_build_action(task: &TaskConfig) -> bool {
    task.cmd.is_some() || !task.pipeline.is_empty() || !task.clean.is_empty()
}

fn validate_pipeline(task: &str, index: usize, pipeline: &PipelineConfig) -> Result<()> {
    let at = format!("task '{task}' pipeline #{}", index + 1);

    if pipeline.src.iter().all(|p| p.starts_with('!')) {
        return Err(config_error(format!(
            "{at}: `src` needs at least one non-excluding pattern"
        )));
    }
    for pattern in &pipeline.src {
        let glob = pattern.strip_prefix('!').unwrap_or(pattern);
        compile_glob(glob).map_err(|e| config_error(format!("{at}: {e}")))?;
    }

    if pipeline.dest.trim().is_empty() {
        return Err(config_error(format!("{at}: `dest` is empty")));
    }

    for stage in &pipeline.stages {
        if stage.when.is_some() && stage.unless.is_some() {
            return Err(config_error(format!(
                "{at}: a stage cannot set both `when` and `unless`"
            )));
        }
        match &stage.kind {
            StageKind::Concat { file, .. } if file.trim().is_empty() => {
                return Err(config_error(format!("{at}: concat stage needs a `file`")));
            }
            StageKind::Command { cmd } if cmd.trim().is_empty() => {
                return Err(config_error(format!("{at}: command stage needs a `cmd`")));
            }
            _ => {}
        }
    }

    Ok(())
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    for (i, rule) in cfg.watch.iter().enumerate() {
        let at = format!("[[watch]] rule #{}", i + 1);

        if rule.patterns.is_empty() {
            return Err(config_error(format!("{at}: `patterns` is empty")));
        }
        if rule.tasks.is_empty() {
            return Err(config_error(format!("{at}: `tasks` is empty")));
        }
        for task in &rule.tasks {
            if !cfg.task.contains_key(task) {
                return Err(DevpipeError::TaskNotFound(format!(
                    "{at} references unknown task '{task}'"
                )));
            }
        }
        for pattern in rule.patterns.iter().chain(rule.exclude.iter()) {
            compile_glob(pattern).map_err(|e| config_error(format!("{at}: {e}")))?;
        }
    }
    Ok(())
}

fn compile_glob(pattern: &str) -> std::result::Result<(), String> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|_| ())
        .map_err(|e| format!("invalid glob pattern '{pattern}': {e}"))
}
