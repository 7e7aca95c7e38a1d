//! Durable task collection with whole-collection replace semantics.
//!
//! There is no row-level update: every mutation is read all, change in memory,
//! write all. A single scheduling process is assumed to be the only writer.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::core::invariants::validate_invariants;
use crate::error::{StoreReadError, StoreWriteError};
use crate::task::{Task, TaskFile, TaskId};

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted collection, surfacing why it could not be read.
    pub fn try_read_all(&self) -> Result<Vec<Task>, StoreReadError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreReadError::Missing {
                    path: self.path.clone(),
                }
            } else {
                StoreReadError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        let file: TaskFile =
            serde_json::from_str(&contents).map_err(|source| StoreReadError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let errors = validate_invariants(&file.tasks);
        if !errors.is_empty() {
            return Err(StoreReadError::Invalid {
                path: self.path.clone(),
                errors,
            });
        }
        Ok(file.tasks)
    }

    /// Read the persisted collection; missing or unreadable state is "no tasks".
    pub fn read_all(&self) -> Vec<Task> {
        match self.try_read_all() {
            Ok(tasks) => {
                debug!(path = %self.path.display(), count = tasks.len(), "task store loaded");
                tasks
            }
            Err(StoreReadError::Missing { .. }) => {
                debug!(path = %self.path.display(), "task store missing, starting empty");
                Vec::new()
            }
            Err(err) => {
                warn!(err = %err, "task store unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the persisted collection atomically (temp file + rename).
    ///
    /// Invariant violations are rejected before anything touches disk.
    pub fn write_all(&self, tasks: &[Task]) -> Result<(), StoreWriteError> {
        let errors = validate_invariants(tasks);
        if !errors.is_empty() {
            return Err(self.write_error(anyhow!(
                "invariant violations: {}",
                errors.join("; ")
            )));
        }
        self.write_atomic(tasks).map_err(|err| self.write_error(err))?;
        debug!(path = %self.path.display(), count = tasks.len(), "task store written");
        Ok(())
    }

    /// Single-writer transaction: read, apply `mutator`, write back.
    pub fn with_store<T, F>(&self, mutator: F) -> Result<T, StoreWriteError>
    where
        F: FnOnce(&mut Vec<Task>) -> T,
    {
        let mut tasks = self.read_all();
        let out = mutator(&mut tasks);
        self.write_all(&tasks)?;
        Ok(out)
    }

    /// Mutate one task by id and persist. Returns the updated task, or `None`
    /// (without writing) when no task has that id.
    pub fn update_task<F>(&self, id: TaskId, mutator: F) -> Result<Option<Task>, StoreWriteError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.read_all();
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            warn!(task_id = id, "task to update not found in store");
            return Ok(None);
        };
        mutator(task);
        let updated = task.clone();
        self.write_all(&tasks)?;
        Ok(Some(updated))
    }

    fn write_atomic(&self, tasks: &[Task]) -> Result<()> {
        let file = TaskFile {
            tasks: tasks.to_vec(),
        };
        let mut buf = serde_json::to_string_pretty(&file).context("serialize tasks")?;
        buf.push('\n');

        let parent = self
            .path
            .parent()
            .with_context(|| format!("task store path missing parent {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, buf)
            .with_context(|| format!("write temp task store {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace task store {}", self.path.display()))?;
        Ok(())
    }

    fn write_error(&self, err: anyhow::Error) -> StoreWriteError {
        StoreWriteError {
            path: self.path.clone(),
            message: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, WorkEntry};
    use crate::test_support::task;

    fn store() -> (tempfile::TempDir, TaskStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = TaskStore::new(temp.path().join("state/tasks.json"));
        (temp, store)
    }

    #[test]
    fn missing_store_reads_empty() {
        let (_temp, store) = store();
        assert!(matches!(
            store.try_read_all(),
            Err(StoreReadError::Missing { .. })
        ));
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn corrupt_store_reads_empty() {
        let (_temp, store) = store();
        fs::create_dir_all(store.path().parent().expect("parent")).expect("dir");
        fs::write(store.path(), "{ not json").expect("write");
        assert!(matches!(
            store.try_read_all(),
            Err(StoreReadError::Parse { .. })
        ));
        assert!(store.read_all().is_empty());
    }

    /// Re-reading after `write_all(read_all())` yields an equal collection.
    #[test]
    fn write_of_read_is_idempotent() {
        let (_temp, store) = store();
        let mut child = task(2, 1, Priority::Low);
        child.work_ledger.push(WorkEntry {
            work_summary: "did a thing".to_string(),
        });
        store
            .write_all(&[task(1, 0, Priority::High), child])
            .expect("seed");

        let first = store.read_all();
        store.write_all(&first).expect("rewrite");
        let first_bytes = fs::read_to_string(store.path()).expect("bytes");
        let second = store.read_all();
        store.write_all(&second).expect("rewrite again");

        assert_eq!(first, second);
        assert_eq!(
            first_bytes,
            fs::read_to_string(store.path()).expect("bytes again")
        );
    }

    #[test]
    fn write_rejects_dangling_parent_and_keeps_previous_state() {
        let (_temp, store) = store();
        store.write_all(&[task(1, 0, Priority::High)]).expect("seed");

        let err = store
            .write_all(&[task(1, 0, Priority::High), task(2, 5, Priority::Low)])
            .unwrap_err();
        assert!(err.to_string().contains("missing parent 5"));
        assert_eq!(store.read_all(), vec![task(1, 0, Priority::High)]);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn with_store_reads_mutates_and_writes() {
        let (_temp, store) = store();
        store.write_all(&[task(1, 0, Priority::High)]).expect("seed");

        let count = store
            .with_store(|tasks| {
                tasks.push(task(2, 1, Priority::Medium));
                tasks.len()
            })
            .expect("transaction");

        assert_eq!(count, 2);
        assert_eq!(store.read_all().len(), 2);
    }

    #[test]
    fn update_task_mutates_by_id() {
        let (_temp, store) = store();
        store
            .write_all(&[task(1, 0, Priority::High), task(2, 1, Priority::Low)])
            .expect("seed");

        let updated = store
            .update_task(2, |task| task.completed = true)
            .expect("update")
            .expect("task exists");
        assert!(updated.completed);
        assert!(store.read_all()[1].completed);

        assert_eq!(store.update_task(99, |_| {}).expect("missing"), None);
    }
}
