//! JSON file task store.
//!
//! The whole store is one JSON document. Every write re-reads the file,
//! checks the expected state and replaces the file atomically through a temp
//! file in the same directory.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StoreError, StoreResult, TaskRecord, TaskStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    tasks: BTreeMap<String, StoredTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTask {
    #[serde(flatten)]
    record: TaskRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Task store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTaskStore {
    path: PathBuf,
}

impl FileTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All tasks, ordered by id.
    pub fn list(&self) -> StoreResult<Vec<TaskRecord>> {
        Ok(self.load()?.tasks.into_values().map(|t| t.record).collect())
    }

    fn load(&self) -> StoreResult<StoreDocument> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, doc: &StoreDocument) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl TaskStore for FileTaskStore {
    fn read(&self, id: &str) -> StoreResult<TaskRecord> {
        self.load()?
            .tasks
            .remove(id)
            .map(|t| t.record)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn write_state(&self, id: &str, previous: &str, next: &str) -> StoreResult<()> {
        let mut doc = self.load()?;
        let task = doc.tasks.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if task.record.state != previous {
            return Err(StoreError::StateConflict {
                task_id: id.to_string(),
                expected: previous.to_string(),
                actual: task.record.state.clone(),
            });
        }
        task.record.state = next.to_string();
        task.updated_at = Some(Utc::now());
        self.save(&doc)?;

        tracing::info!(task = id, from = previous, to = next, "Task state written");
        Ok(())
    }

    fn upsert(&self, task: TaskRecord) -> StoreResult<()> {
        let mut doc = self.load()?;
        let id = task.id.clone();
        doc.tasks.insert(id, StoredTask { record: task, updated_at: Some(Utc::now()) });
        self.save(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path().join("tasks.json"));
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(store.read("t1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_upsert_then_advance() {
        let dir = TempDir::new().unwrap();
        let store = FileTaskStore::new(dir.path().join("nested").join("tasks.json"));

        store.upsert(TaskRecord::new("t1", "ToDo").with_item("AC1", false)).unwrap();
        store.write_state("t1", "ToDo", "Specified").unwrap();

        let task = store.read("t1").unwrap();
        assert_eq!(task.state, "Specified");
        assert_eq!(task.checklist.len(), 1);
    }

    #[test]
    fn test_conflict_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let store = FileTaskStore::new(&path);
        store.upsert(TaskRecord::new("t1", "Planned")).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = store.write_state("t1", "ToDo", "Specified").unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_two_handles_detect_stale_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let a = FileTaskStore::new(&path);
        let b = FileTaskStore::new(&path);
        a.upsert(TaskRecord::new("t1", "ToDo")).unwrap();

        let seen_by_b = b.read("t1").unwrap().state;
        a.write_state("t1", "ToDo", "Specified").unwrap();

        assert!(b.write_state("t1", &seen_by_b, "Specified").unwrap_err().is_conflict());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(FileTaskStore::new(&path).list(), Err(StoreError::Corrupt(_))));
    }
}
