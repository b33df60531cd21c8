use serde::{Deserialize, Serialize};

/// Status values. `"pending"` is the default; clients conventionally use
/// `"completed"`, but any non-empty string is accepted on update.
pub struct TaskStatus;

impl TaskStatus {
    pub const PENDING: &'static str = "pending";
}

/// A task record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub status: String,
}

/// Request body for creating or updating a task.
///
/// Fields left empty are treated as "not provided": on create the status
/// falls back to pending, on update the stored value is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
}

impl Task {
    /// Overwrite every field the patch provides.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if !patch.title.is_empty() {
            self.title.clone_from(&patch.title);
        }
        if !patch.description.is_empty() {
            self.description.clone_from(&patch.description);
        }
        if !patch.status.is_empty() {
            self.status.clone_from(&patch.status);
        }
    }
}
