//! Arena-style allocation of child tasks from a decomposition verdict.

use crate::core::types::SubtaskSpec;
use crate::task::{Task, TaskId};

/// Next unused id: one past the largest id in the store.
///
/// The store never deletes tasks, so this never reuses an id.
pub fn next_task_id(tasks: &[Task]) -> TaskId {
    tasks.iter().map(|task| task.id).max().unwrap_or(0) + 1
}

/// Build fresh child tasks of `parent_id`, one per subtask, in the given order.
pub fn build_children(tasks: &[Task], parent_id: TaskId, specs: &[SubtaskSpec]) -> Vec<Task> {
    let first = next_task_id(tasks);
    specs
        .iter()
        .zip(first..)
        .map(|(spec, id)| Task {
            id,
            parent_id,
            description: spec.description.trim().to_string(),
            priority: spec.priority,
            requirements_for_success: spec.requirements_for_success.trim().to_string(),
            work_ledger: Vec::new(),
            completed: false,
        })
        .collect()
}

/// Direct children of `parent_id`, in store order.
pub fn children_of(tasks: &[Task], parent_id: TaskId) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| task.parent_id == parent_id && task.id != parent_id)
        .collect()
}
