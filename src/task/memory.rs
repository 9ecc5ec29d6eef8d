//! In-memory task store.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{StoreError, StoreResult, TaskRecord, TaskStore};

/// Mutex-guarded map of tasks. Useful for tests and for embedding the engine.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<BTreeMap<String, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with tasks.
    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskRecord>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self { tasks: Mutex::new(map) }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn read(&self, id: &str) -> StoreResult<TaskRecord> {
        self.tasks.lock().get(id).cloned().ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn write_state(&self, id: &str, previous: &str, next: &str) -> StoreResult<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if task.state != previous {
            return Err(StoreError::StateConflict {
                task_id: id.to_string(),
                expected: previous.to_string(),
                actual: task.state.clone(),
            });
        }
        task.state = next.to_string();
        Ok(())
    }

    fn upsert(&self, task: TaskRecord) -> StoreResult<()> {
        self.tasks.lock().insert(task.id.clone(), task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_write() {
        let store = InMemoryTaskStore::with_tasks([TaskRecord::new("t1", "ToDo")]);
        store.write_state("t1", "ToDo", "Specified").unwrap();
        assert_eq!(store.read("t1").unwrap().state, "Specified");
    }

    #[test]
    fn test_stale_write_conflicts() {
        let store = InMemoryTaskStore::with_tasks([TaskRecord::new("t1", "ToDo")]);
        store.write_state("t1", "ToDo", "Specified").unwrap();

        let err = store.write_state("t1", "ToDo", "Specified").unwrap_err();
        match err {
            StoreError::StateConflict { expected, actual, .. } => {
                assert_eq!(expected, "ToDo");
                assert_eq!(actual, "Specified");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.read("t1").unwrap().state, "Specified");
    }

    #[test]
    fn test_missing_task() {
        let store = InMemoryTaskStore::new();
        assert!(store.is_empty());
        assert!(matches!(store.read("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.write_state("nope", "A", "B"), Err(StoreError::NotFound(_))));
    }
}
