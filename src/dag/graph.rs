// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::dag::task_info::TaskAction;
use crate::engine::TaskName;
use crate::errors::{DevpipeError, Result};

#[derive(Debug, Clone)]
struct TaskNode {
    name: TaskName,
    /// Direct dependencies in declaration order.
    deps: Vec<TaskName>,
    action: TaskAction,
}

/// Registry of named tasks and their dependency edges.
///
/// Edges point from a dependency to its dependent. Every mutation is checked
/// up front, so the graph is acyclic at all times and a run never has to
/// discover a cycle.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    graph: DiGraph<TaskNode, ()>,
    index: HashMap<TaskName, NodeIndex>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a validated [`ConfigFile`].
    ///
    /// Tasks are registered in topological order so that every dependency
    /// exists by the time its dependent is added.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut order: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (name, task) in cfg.tasks() {
            order.add_node(name.as_str());
            for dep in &task.after {
                order.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
        let sorted = toposort(&order, None).map_err(|cycle| {
            DevpipeError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))
        })?;

        let mut registry = Self::new();
        for name in sorted {
            let Some(task) = cfg.tasks().get(name) else {
                continue;
            };
            registry.register(name, task.after.clone(), TaskAction::from_config(task))?;
        }
        Ok(registry)
    }

    /// Add a task.
    ///
    /// Fails with `DuplicateTask` if the name is taken, `DagCycle` if the task
    /// lists itself, and `TaskNotFound` if a dependency is not registered yet.
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        deps: Vec<TaskName>,
        action: TaskAction,
    ) -> Result<()> {
        let name = name.into();

        if self.index.contains_key(&name) {
            return Err(DevpipeError::DuplicateTask(name));
        }
        if deps.iter().any(|d| *d == name) {
            return Err(DevpipeError::DagCycle(format!(
                "task '{name}' cannot depend on itself"
            )));
        }
        let mut dep_indices = Vec::with_capacity(deps.len());
        for dep in &deps {
            let idx = self.index.get(dep).ok_or_else(|| {
                DevpipeError::TaskNotFound(format!(
                    "task '{name}' depends on unregistered task '{dep}'"
                ))
            })?;
            dep_indices.push(*idx);
        }

        let node = self.graph.add_node(TaskNode {
            name: name.clone(),
            deps: Vec::new(),
            action,
        });
        self.index.insert(name.clone(), node);

        for (dep, dep_idx) in deps.into_iter().zip(dep_indices) {
            if self.graph.find_edge(dep_idx, node).is_none() {
                self.graph.add_edge(dep_idx, node, ());
                self.graph[node].deps.push(dep);
            }
        }

        debug!(task = %name, deps = ?self.graph[node].deps, "registered task");
        Ok(())
    }

    /// Make `task` wait for `dep`.
    ///
    /// Rejected with `DagCycle` if `dep` already (transitively) depends on
    /// `task`; the registry is left unchanged in that case.
    pub fn add_dependency(&mut self, task: &str, dep: &str) -> Result<()> {
        let task_idx = self.node(task)?;
        let dep_idx = self.node(dep)?;

        if task_idx == dep_idx || has_path_connecting(&self.graph, task_idx, dep_idx, None) {
            return Err(DevpipeError::DagCycle(format!(
                "making '{task}' depend on '{dep}' would create a cycle"
            )));
        }

        if self.graph.find_edge(dep_idx, task_idx).is_none() {
            self.graph.add_edge(dep_idx, task_idx, ());
            self.graph[task_idx].deps.push(dep.to_string());
        }
        Ok(())
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DevpipeError::TaskNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.index
            .get(name)
            .map(|idx| self.graph[*idx].deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that wait for it).
    pub fn dependents_of(&self, name: &str) -> Vec<TaskName> {
        let Some(idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<TaskName> = self
            .graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .map(|n| self.graph[n].name.clone())
            .collect();
        out.sort_unstable();
        out
    }

    pub fn action_of(&self, name: &str) -> Option<&TaskAction> {
        self.index.get(name).map(|idx| &self.graph[*idx].action)
    }

    /// The requested tasks plus everything they transitively depend on.
    pub fn closure<S: AsRef<str>>(&self, roots: &[S]) -> Result<BTreeSet<TaskName>> {
        let mut seen = BTreeSet::new();
        let mut stack = Vec::new();
        for root in roots {
            stack.push(self.node(root.as_ref())?);
        }

        while let Some(idx) = stack.pop() {
            if !seen.insert(self.graph[idx].name.clone()) {
                continue;
            }
            stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
        }
        Ok(seen)
    }
}
