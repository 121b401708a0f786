// src/watch/rules.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;

/// One compiled `[[watch]]` rule: path globs mapped to a task group.
///
/// Patterns are evaluated against paths relative to the project root, with
/// forward slashes. `*` does not cross `/`; use `**` for that.
#[derive(Clone)]
pub struct WatchRule {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: GlobSet,
    tasks: Vec<TaskName>,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .finish()
    }
}

impl WatchRule {
    pub fn new(patterns: &[String], exclude: &[String], tasks: Vec<TaskName>) -> Result<Self> {
        Ok(Self {
            patterns: patterns.to_vec(),
            include: build_globset(patterns)?,
            exclude: build_globset(exclude)?,
            tasks,
        })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("building glob set")
}

/// Maps changed paths to the tasks that should run.
#[derive(Debug, Clone, Default)]
pub struct WatchDispatcher {
    rules: Vec<WatchRule>,
}

impl WatchDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut dispatcher = Self::new();
        for rule in cfg.watch_rules() {
            dispatcher.add_rule(WatchRule::new(
                &rule.patterns,
                &rule.exclude,
                rule.tasks.clone(),
            )?);
        }
        Ok(dispatcher)
    }

    pub fn add_rule(&mut self, rule: WatchRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of the task groups of every rule matching any of `rel_paths`,
    /// in rule order without duplicates. Empty when nothing matches.
    pub fn tasks_for<'a>(&self, rel_paths: impl IntoIterator<Item = &'a str>) -> Vec<TaskName> {
        let paths: Vec<&str> = rel_paths.into_iter().collect();
        let mut tasks: Vec<TaskName> = Vec::new();

        for rule in &self.rules {
            if paths.iter().any(|p| rule.matches(p)) {
                for task in rule.tasks() {
                    if !tasks.contains(task) {
                        tasks.push(task.clone());
                    }
                }
            }
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn dispatcher() -> WatchDispatcher {
        let mut d = WatchDispatcher::new();
        d.add_rule(
            WatchRule::new(
                &strings(&["static/src/*", "package.json"]),
                &strings(&["static/src/*.tmp"]),
                strings(&["static:build"]),
            )
            .unwrap(),
        );
        d.add_rule(
            WatchRule::new(
                &strings(&["static/dist/*", "OBIJudge"]),
                &[],
                strings(&["spawn"]),
            )
            .unwrap(),
        );
        d
    }

    #[test]
    fn star_does_not_cross_directories() {
        let d = dispatcher();
        assert_eq!(d.tasks_for(["static/src/app.js"]), vec!["static:build"]);
        assert!(d.tasks_for(["static/src/vendor/app.js"]).is_empty());
    }

    #[test]
    fn excluded_paths_do_not_match() {
        let d = dispatcher();
        assert!(d.tasks_for(["static/src/app.tmp"]).is_empty());
    }

    #[test]
    fn batch_yields_union_without_duplicates() {
        let d = dispatcher();
        assert_eq!(
            d.tasks_for(["OBIJudge", "static/src/a.css", "static/dist/a.css", "package.json"]),
            vec!["static:build", "spawn"]
        );
    }

    #[test]
    fn unmatched_rule_is_inert() {
        let d = dispatcher();
        assert!(d.tasks_for(["README.md"]).is_empty());
        assert!(WatchDispatcher::new().tasks_for(["anything"]).is_empty());
    }
}
