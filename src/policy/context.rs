//! Read-only inputs for rule predicates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::task::TaskRecord;

/// Everything a predicate may look at. Built once per phase invocation and
/// never mutated.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    root: PathBuf,
    task: Option<TaskRecord>,
    ignore_dirs: Vec<String>,
    max_depth: usize,
    command_timeout: Duration,
}

impl PolicyContext {
    /// Create a context rooted at the project directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            task: None,
            ignore_dirs: default_ignore_dirs(),
            max_depth: 8,
            command_timeout: Duration::from_secs(30),
        }
    }

    /// Attach the task being advanced.
    #[must_use]
    pub fn with_task(mut self, task: TaskRecord) -> Self {
        self.task = Some(task);
        self
    }

    /// Directories skipped while searching for artifacts.
    #[must_use]
    pub fn with_ignore_dirs(mut self, dirs: Vec<String>) -> Self {
        self.ignore_dirs = dirs;
        self
    }

    /// Maximum directory depth searched for artifacts.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Timeout for command checks that do not set their own.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn task(&self) -> Option<&TaskRecord> {
        self.task.as_ref()
    }

    pub fn ignore_dirs(&self) -> &[String] {
        &self.ignore_dirs
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Whether a directory name is skipped during artifact search.
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.iter().any(|d| d == name)
    }
}

/// Directories never searched for artifacts unless configured otherwise.
pub fn default_ignore_dirs() -> Vec<String> {
    [".git", "node_modules", "target", "dist", "build", ".venv"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = PolicyContext::new("/repo");
        assert_eq!(ctx.root(), Path::new("/repo"));
        assert!(ctx.task().is_none());
        assert!(ctx.is_ignored_dir("node_modules"));
        assert!(!ctx.is_ignored_dir("docs"));
        assert_eq!(ctx.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_builders() {
        let ctx = PolicyContext::new(".")
            .with_task(TaskRecord::new("t1", "ToDo"))
            .with_ignore_dirs(vec!["vendor".to_string()])
            .with_max_depth(2);

        assert_eq!(ctx.task().map(|t| t.id.as_str()), Some("t1"));
        assert!(ctx.is_ignored_dir("vendor"));
        assert!(!ctx.is_ignored_dir("target"));
        assert_eq!(ctx.max_depth(), 2);
    }
}
