//! Human-readable rendering of the task tree.

use crate::task::{Task, TaskId};

/// One line per task, children indented under their parent in store order.
///
/// Tasks whose parent is missing are rendered as roots so nothing is hidden.
pub fn render_task_tree(tasks: &[Task], stack: &[TaskId]) -> String {
    let mut lines = Vec::new();
    for task in tasks
        .iter()
        .filter(|task| task.is_root() || !tasks.iter().any(|t| t.id == task.parent_id))
    {
        render_inner(tasks, task, stack, 0, &mut lines);
    }
    lines.join("\n")
}

fn render_inner(tasks: &[Task], task: &Task, stack: &[TaskId], depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let mark = if task.completed { "x" } else { " " };
    let active = if stack.contains(&task.id) { " *" } else { "" };
    lines.push(format!(
        "{indent}- [{mark}] #{} ({}, ledger={}){active} {}",
        task.id,
        task.priority,
        task.work_ledger.len(),
        first_line(&task.description),
    ));
    for child in tasks.iter().filter(|child| child.parent_id == task.id && child.id != task.id) {
        render_inner(tasks, child, stack, depth + 1, lines);
    }
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}
