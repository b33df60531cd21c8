use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use huddle_core::task::{Task, TaskPatch, TaskStatus};

use crate::error::StoreError;

#[derive(Debug)]
struct TaskList {
    tasks: Vec<Task>,
    next_id: u64,
}

/// In-memory task list guarded by a single mutex.
///
/// Cloning is cheap and every clone sees the same list. Ids start at 1 and
/// are never reused, even after a delete.
#[derive(Clone, Debug)]
pub struct TaskStore {
    inner: Arc<Mutex<TaskList>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TaskList {
                tasks: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Create a task from the provided fields, assigning the next id.
    #[instrument(skip(self, patch), fields(title = %patch.title))]
    pub fn create(&self, patch: TaskPatch) -> Task {
        let mut list = self.inner.lock();
        let id = list.next_id;
        list.next_id += 1;

        let status = if patch.status.is_empty() {
            TaskStatus::PENDING.to_string()
        } else {
            patch.status
        };
        let task = Task {
            id,
            title: patch.title,
            description: patch.description,
            status,
        };
        list.tasks.push(task.clone());
        debug!(task_id = id, "task created");
        task
    }

    /// All tasks in creation order.
    pub fn list(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    #[instrument(skip(self))]
    pub fn get(&self, id: u64) -> Result<Task, StoreError> {
        self.inner
            .lock()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Apply the non-empty fields of `patch` to an existing task.
    #[instrument(skip(self, patch))]
    pub fn update(&self, id: u64, patch: &TaskPatch) -> Result<Task, StoreError> {
        let mut list = self.inner.lock();
        let task = list
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        task.apply(patch);
        Ok(task.clone())
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut list = self.inner.lock();
        let pos = list
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        list.tasks.remove(pos);
        debug!(task_id = id, "task deleted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(title: &str) -> TaskPatch {
        TaskPatch {
            title: title.into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let store = TaskStore::new();
        let a = store.create(patch("a"));
        let b = store.create(patch("b"));
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn create_defaults_status_to_pending() {
        let store = TaskStore::new();
        let task = store.create(patch("a"));
        assert_eq!(task.status, "pending");

        let done = store.create(TaskPatch {
            title: "b".into(),
            status: "completed".into(),
            ..Default::default()
        });
        assert_eq!(done.status, "completed");
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = TaskStore::new();
        assert_eq!(store.get(7), Err(StoreError::NotFound(7)));
    }

    #[test]
    fn update_merges_non_empty_fields() {
        let store = TaskStore::new();
        let task = store.create(TaskPatch {
            title: "a".into(),
            description: "first".into(),
            ..Default::default()
        });

        let updated = store
            .update(
                task.id,
                &TaskPatch {
                    status: "completed".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "a");
        assert_eq!(updated.description, "first");
        assert_eq!(updated.status, "completed");
        assert_eq!(store.get(task.id).unwrap(), updated);
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = TaskStore::new();
        assert!(store.update(3, &patch("x")).is_err());
    }

    #[test]
    fn delete_removes_and_ids_are_not_reused() {
        let store = TaskStore::new();
        let a = store.create(patch("a"));
        store.create(patch("b"));

        store.delete(a.id).unwrap();
        assert_eq!(store.delete(a.id), Err(StoreError::NotFound(a.id)));
        assert_eq!(store.list().len(), 1);

        let c = store.create(patch("c"));
        assert_eq!(c.id, 3);
    }

    #[test]
    fn clones_share_state() {
        let store = TaskStore::new();
        let other = store.clone();
        store.create(patch("shared"));
        assert_eq!(other.list()[0].title, "shared");
    }

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let store = TaskStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.create(patch(&format!("t{i}"))).id)
            })
            .collect();
        let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }
}
