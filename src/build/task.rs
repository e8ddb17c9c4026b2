//! Named tasks and the dependency graph between them.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named, independently invocable unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Html,
    Sass,
    Js,
    Sprite,
    Img,
    Fonts,
    Clean,
    Webserver,
    Build,
    Watch,
    Default,
}

impl TaskName {
    /// Every task, in the order `sluice tasks` lists them.
    pub const ALL: [TaskName; 11] = [
        TaskName::Html,
        TaskName::Sass,
        TaskName::Js,
        TaskName::Sprite,
        TaskName::Img,
        TaskName::Fonts,
        TaskName::Clean,
        TaskName::Webserver,
        TaskName::Build,
        TaskName::Watch,
        TaskName::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Html => "build:html",
            TaskName::Sass => "build:sass",
            TaskName::Js => "build:js",
            TaskName::Sprite => "build:sprite",
            TaskName::Img => "build:img",
            TaskName::Fonts => "build:fonts",
            TaskName::Clean => "clean",
            TaskName::Webserver => "webserver",
            TaskName::Build => "build",
            TaskName::Watch => "watch",
            TaskName::Default => "default",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TaskName::Html => "Copy HTML pages to the output directory",
            TaskName::Sass => "Compile, prefix and (in production) purge and minify stylesheets",
            TaskName::Js => "Bundle the script entry point and its imports",
            TaskName::Sprite => "Pack icons into a sprite sheet and stylesheet partial",
            TaskName::Img => "Optimise changed images",
            TaskName::Fonts => "Copy font files",
            TaskName::Clean => "Delete the output directory",
            TaskName::Webserver => "Serve the output directory with live reload",
            TaskName::Build => "Run every build task",
            TaskName::Watch => "Rebuild on source changes",
            TaskName::Default => "Build, serve and watch",
        }
    }

    /// Tasks that must complete before this one starts.
    pub fn dependencies(&self) -> &'static [TaskName] {
        match self {
            TaskName::Img => &[TaskName::Sprite],
            _ => &[],
        }
    }

    /// Members of an aggregate task; empty for leaf tasks.
    ///
    /// `build` members run concurrently; `default` members run in sequence.
    pub fn members(&self) -> &'static [TaskName] {
        match self {
            TaskName::Build => {
                &[TaskName::Html, TaskName::Sass, TaskName::Fonts, TaskName::Js, TaskName::Img]
            }
            TaskName::Default => &[TaskName::Build, TaskName::Webserver, TaskName::Watch],
            _ => &[],
        }
    }

    pub fn is_aggregate(&self) -> bool {
        !self.members().is_empty()
    }

    /// Runs until the process is interrupted.
    pub fn is_long_running(&self) -> bool {
        matches!(self, TaskName::Webserver | TaskName::Watch | TaskName::Default)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown task name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Task '{0}' is not in your task list")]
pub struct UnknownTask(pub String);

impl FromStr for TaskName {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

/// Error during task ordering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskGraphError {
    /// Circular dependency detected
    #[error("Circular dependency detected involving task '{0}'")]
    CyclicDependency(TaskName),
}

/// Dependency edges between tasks.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    edges: BTreeMap<TaskName, Vec<TaskName>>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        let edges = TaskName::ALL
            .iter()
            .filter(|t| !t.dependencies().is_empty())
            .map(|t| (*t, t.dependencies().to_vec()))
            .collect();
        Self { edges }
    }
}

impl TaskGraph {
    /// Graph with no edges.
    pub fn empty() -> Self {
        Self { edges: BTreeMap::new() }
    }

    /// Add a `task` depends on `dep` edge.
    pub fn with_edge(mut self, task: TaskName, dep: TaskName) -> Self {
        self.edges.entry(task).or_default().push(dep);
        self
    }

    pub fn dependencies(&self, task: TaskName) -> &[TaskName] {
        self.edges.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Expand aggregates in `targets` into leaf tasks.
    pub fn leaves(&self, targets: &[TaskName]) -> Vec<TaskName> {
        let mut out = Vec::new();
        for target in targets {
            if target.is_aggregate() {
                out.extend(self.leaves(target.members()));
            } else if !out.contains(target) {
                out.push(*target);
            }
        }
        out
    }

    /// Leaf tasks for `targets` plus their transitive dependencies, with
    /// every dependency placed before its dependents.
    pub fn order(&self, targets: &[TaskName]) -> Result<Vec<TaskName>, TaskGraphError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for task in self.leaves(targets) {
            self.visit(task, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit(
        &self,
        task: TaskName,
        visited: &mut HashSet<TaskName>,
        visiting: &mut HashSet<TaskName>,
        result: &mut Vec<TaskName>,
    ) -> Result<(), TaskGraphError> {
        if visited.contains(&task) {
            return Ok(());
        }
        if !visiting.insert(task) {
            return Err(TaskGraphError::CyclicDependency(task));
        }

        for dep in self.dependencies(task) {
            self.visit(*dep, visited, visiting, result)?;
        }

        visiting.remove(&task);
        visited.insert(task);
        result.push(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for task in TaskName::ALL {
            assert_eq!(task.as_str().parse::<TaskName>().unwrap(), task);
        }
        assert_eq!("build:css".parse::<TaskName>(), Err(UnknownTask("build:css".to_string())));
    }

    #[test]
    fn test_only_img_has_dependency() {
        for task in TaskName::ALL {
            let deps = task.dependencies();
            if task == TaskName::Img {
                assert_eq!(deps, &[TaskName::Sprite]);
            } else {
                assert!(deps.is_empty(), "{} should have no dependencies", task);
            }
        }
    }

    #[test]
    fn test_build_order_puts_sprite_before_img() {
        let order = TaskGraph::default().order(&[TaskName::Build]).unwrap();
        assert_eq!(order.len(), 6);
        let sprite = order.iter().position(|t| *t == TaskName::Sprite).unwrap();
        let img = order.iter().position(|t| *t == TaskName::Img).unwrap();
        assert!(sprite < img);
        assert!(!order.contains(&TaskName::Clean));
    }

    #[test]
    fn test_single_leaf_pulls_dependency() {
        let order = TaskGraph::default().order(&[TaskName::Img]).unwrap();
        assert_eq!(order, vec![TaskName::Sprite, TaskName::Img]);
        let order = TaskGraph::default().order(&[TaskName::Html]).unwrap();
        assert_eq!(order, vec![TaskName::Html]);
    }

    #[test]
    fn test_default_leaves() {
        let leaves = TaskGraph::default().leaves(&[TaskName::Default]);
        assert_eq!(
            leaves,
            vec![
                TaskName::Html,
                TaskName::Sass,
                TaskName::Fonts,
                TaskName::Js,
                TaskName::Img,
                TaskName::Webserver,
                TaskName::Watch
            ]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let graph = TaskGraph::empty()
            .with_edge(TaskName::Html, TaskName::Fonts)
            .with_edge(TaskName::Fonts, TaskName::Html);
        let err = graph.order(&[TaskName::Html]).unwrap_err();
        assert!(matches!(err, TaskGraphError::CyclicDependency(_)));
    }

    #[test]
    fn test_long_running() {
        assert!(TaskName::Default.is_long_running());
        assert!(TaskName::Webserver.is_long_running());
        assert!(!TaskName::Build.is_long_running());
    }
}
