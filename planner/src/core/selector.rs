//! Deterministic candidate selection and stack unwinding.

use crate::task::{Task, TaskId};

/// Incomplete tasks eligible for the current level, highest priority first.
///
/// With a non-empty `stack` only children of its top are eligible; otherwise
/// every incomplete task is. Ties keep store order (stable sort).
pub fn select_candidates<'a>(tasks: &'a [Task], stack: &[TaskId]) -> Vec<&'a Task> {
    let mut candidates: Vec<&Task> = match stack.last() {
        Some(&parent) => tasks
            .iter()
            .filter(|task| !task.completed && task.parent_id == parent)
            .collect(),
        None => tasks.iter().filter(|task| !task.completed).collect(),
    };
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates
}

/// Head of [`select_candidates`], if any.
pub fn head_candidate<'a>(tasks: &'a [Task], stack: &[TaskId]) -> Option<&'a Task> {
    select_candidates(tasks, stack).into_iter().next()
}

/// Pop stack entries whose level has nothing left to schedule.
///
/// An entry is popped when its task is missing, already completed, or has no
/// incomplete children. The popped parent becomes an ordinary candidate of the
/// level above again. Returns popped ids, innermost first.
pub fn unwind_stack(tasks: &[Task], stack: &mut Vec<TaskId>) -> Vec<TaskId> {
    let mut popped = Vec::new();
    while let Some(&top) = stack.last() {
        let parent_open = tasks.iter().any(|task| task.id == top && !task.completed);
        if parent_open && !select_candidates(tasks, stack).is_empty() {
            break;
        }
        stack.pop();
        popped.push(top);
    }
    popped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use crate::test_support::{completed_task, task};

    fn ids(tasks: &[&Task]) -> Vec<TaskId> {
        tasks.iter().map(|task| task.id).collect()
    }

    #[test]
    fn orders_by_priority_descending() {
        let tasks = vec![
            task(1, 0, Priority::Low),
            task(2, 0, Priority::High),
            task(3, 0, Priority::Medium),
        ];
        assert_eq!(ids(&select_candidates(&tasks, &[])), vec![2, 3, 1]);
    }

    #[test]
    fn ties_keep_store_order() {
        let tasks = vec![
            task(4, 0, Priority::Medium),
            task(2, 0, Priority::Medium),
            task(9, 0, Priority::High),
            task(1, 0, Priority::Medium),
        ];
        assert_eq!(ids(&select_candidates(&tasks, &[])), vec![9, 4, 2, 1]);
    }

    #[test]
    fn completed_tasks_are_never_candidates() {
        let tasks = vec![
            completed_task(1, 0, Priority::High),
            task(2, 1, Priority::Low),
            completed_task(3, 1, Priority::High),
        ];
        assert_eq!(ids(&select_candidates(&tasks, &[])), vec![2]);
        assert_eq!(ids(&select_candidates(&tasks, &[1])), vec![2]);
    }

    #[test]
    fn stack_restricts_to_children_of_top() {
        let tasks = vec![
            task(1, 0, Priority::High),
            task(2, 1, Priority::Low),
            task(3, 1, Priority::High),
            task(4, 2, Priority::High),
        ];
        assert_eq!(ids(&select_candidates(&tasks, &[1])), vec![3, 2]);
        assert_eq!(ids(&select_candidates(&tasks, &[1, 2])), vec![4]);
        assert_eq!(head_candidate(&tasks, &[1]).map(|t| t.id), Some(3));
    }

    #[test]
    fn unwind_pops_levels_without_open_children() {
        let tasks = vec![
            task(1, 0, Priority::High),
            task(2, 1, Priority::High),
            completed_task(3, 2, Priority::High),
            task(4, 1, Priority::Low),
        ];
        let mut stack = vec![1, 2];
        let popped = unwind_stack(&tasks, &mut stack);
        assert_eq!(popped, vec![2]);
        assert_eq!(stack, vec![1]);
    }

    #[test]
    fn unwind_pops_missing_and_completed_parents() {
        let tasks = vec![completed_task(1, 0, Priority::High), task(2, 1, Priority::Low)];
        let mut stack = vec![1, 42];
        let popped = unwind_stack(&tasks, &mut stack);
        assert_eq!(popped, vec![42, 1]);
        assert!(stack.is_empty());
    }

    #[test]
    fn unwind_keeps_level_with_open_children() {
        let tasks = vec![task(1, 0, Priority::High), task(2, 1, Priority::Low)];
        let mut stack = vec![1];
        assert!(unwind_stack(&tasks, &mut stack).is_empty());
        assert_eq!(stack, vec![1]);
    }
}
