//! Task result types.
//!
//! Contains types for representing the outcome of task invocations.

use crate::build::task::TaskName;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task wrote at least one output
    Success,
    /// Task had nothing to write (up to date, or no matching sources)
    Skipped,
    /// Task failed with error
    Failed(String),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task that ran
    pub task: TaskName,
    pub status: TaskStatus,
    /// Files written
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl TaskResult {
    /// Create a result from the files a task wrote; no files means skipped.
    pub fn from_outputs(task: TaskName, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        let status = if outputs.is_empty() { TaskStatus::Skipped } else { TaskStatus::Success };
        Self { task, status, outputs, duration }
    }

    /// Create a failed result.
    pub fn failed(task: TaskName, error: String, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Failed(error), outputs: vec![], duration }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete task run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each task, in completion order
    pub tasks: Vec<TaskResult>,
    /// Total duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Success)).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Skipped)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Result for a specific task, if it ran.
    pub fn get(&self, task: TaskName) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get failed task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.tasks.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for result in self.failures() {
                lines.push(format!("  - {}: {}", result.task, result.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} built, {} skipped ({} total) in {}",
                success,
                skipped,
                total,
                format_duration(self.total_duration)
            ));
        }

        lines.join("\n")
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{} ms", millis)
    } else {
        format!("{:.2} s", duration.as_secs_f64())
    }
}
