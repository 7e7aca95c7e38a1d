//! Semantic invariants of the task store not expressible via serde alone.

use std::collections::HashSet;

use crate::task::{ROOT_PARENT_ID, Task};

/// Check store-wide invariants:
/// - ids are positive and unique across the whole store
/// - every non-root `parent_id` references an existing task
/// - no task is its own parent
pub fn validate_invariants(tasks: &[Task]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for task in tasks {
        if task.id == ROOT_PARENT_ID {
            errors.push("task id 0 is reserved for root parents".to_string());
        }
        if !seen.insert(task.id) {
            errors.push(format!("duplicate task id {}", task.id));
        }
    }

    for task in tasks {
        if task.parent_id == ROOT_PARENT_ID {
            continue;
        }
        if task.parent_id == task.id {
            errors.push(format!("task {} is its own parent", task.id));
        } else if !seen.contains(&task.parent_id) {
            errors.push(format!(
                "task {} references missing parent {}",
                task.id, task.parent_id
            ));
        }
    }

    errors
}
