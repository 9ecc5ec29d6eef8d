//! Task store boundary.
//!
//! The engine reads a task's current state and computes its next one; writing
//! it back belongs to the store. Writes are compare-and-swap on the previous
//! state so a concurrent update surfaces as [`StoreError::StateConflict`]
//! instead of being silently overwritten.

mod file;
mod memory;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A checklist item (acceptance criterion, definition-of-done entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,

    #[serde(default)]
    pub done: bool,
}

impl ChecklistItem {
    pub fn new(text: impl Into<String>, done: bool) -> Self {
        Self { text: text.into(), done }
    }
}

/// What the engine knows about a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier
    pub id: String,

    /// Current workflow state label
    pub state: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItem>,
}

impl TaskRecord {
    /// Create a task in the given state.
    pub fn new(id: impl Into<String>, state: impl Into<String>) -> Self {
        Self { id: id.into(), state: state.into(), labels: Vec::new(), checklist: Vec::new() }
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Add a checklist item.
    #[must_use]
    pub fn with_item(mut self, text: impl Into<String>, done: bool) -> Self {
        self.checklist.push(ChecklistItem::new(text, done));
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Unchecked checklist items.
    pub fn open_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.checklist.iter().filter(|i| !i.done)
    }
}

/// Errors raised at the task-store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No task with this id.
    #[error("task '{0}' not found")]
    NotFound(String),

    /// The stored state moved on since it was read.
    #[error("STATE_CONFLICT: task '{task_id}' expected in '{expected}' but is now in '{actual}'")]
    StateConflict { task_id: String, expected: String, actual: String },

    /// IO error.
    #[error("task store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file is malformed.
    #[error("task store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the caller should re-fetch and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }
}

/// Result type for task store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for task state.
pub trait TaskStore {
    /// Read a task.
    fn read(&self, id: &str) -> StoreResult<TaskRecord>;

    /// Move a task from `previous` to `next`, failing if it is no longer in
    /// `previous`.
    fn write_state(&self, id: &str, previous: &str, next: &str) -> StoreResult<()>;

    /// Create or replace a task.
    fn upsert(&self, task: TaskRecord) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builders() {
        let task = TaskRecord::new("task-1", "To Do")
            .with_label("backend")
            .with_item("AC1", true)
            .with_item("AC2", false);

        assert!(task.has_label("backend"));
        assert!(!task.has_label("frontend"));
        assert_eq!(task.open_items().count(), 1);
    }

    #[test]
    fn test_conflict_message() {
        let err = StoreError::StateConflict {
            task_id: "task-1".to_string(),
            expected: "To Do".to_string(),
            actual: "Planned".to_string(),
        };
        assert!(err.is_conflict());
        assert!(err.to_string().starts_with("STATE_CONFLICT"));
        assert!(!StoreError::NotFound("x".to_string()).is_conflict());
    }

    #[test]
    fn test_record_json_omits_empty_lists() {
        let json = serde_json::to_string(&TaskRecord::new("t", "A")).unwrap();
        assert_eq!(json, r#"{"id":"t","state":"A"}"#);
    }
}
