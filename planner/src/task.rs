use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Task identifier. Positive, allocated monotonically, never reused.
pub type TaskId = u64;

/// `parent_id` value marking a root task.
pub const ROOT_PARENT_ID: TaskId = 0;

/// Sibling ordering hint. Declaration order gives `Low < Medium < High`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}' (expected low|medium|high)")),
        }
    }
}

/// Summary of one execution round.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkEntry {
    pub work_summary: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub parent_id: TaskId,
    pub description: String,
    pub priority: Priority,
    pub requirements_for_success: String,
    /// Append-only.
    pub work_ledger: Vec<WorkEntry>,
    pub completed: bool,
}

impl Task {
    pub fn new_root(
        id: TaskId,
        description: impl Into<String>,
        requirements_for_success: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            parent_id: ROOT_PARENT_ID,
            description: description.into(),
            priority,
            requirements_for_success: requirements_for_success.into(),
            work_ledger: Vec::new(),
            completed: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    /// All ledger summaries, oldest first, separated by blank lines.
    pub fn ledger_text(&self) -> String {
        self.work_ledger
            .iter()
            .map(|entry| entry.work_summary.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// On-disk shape of the task store.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFile {
    pub tasks: Vec<Task>,
}
