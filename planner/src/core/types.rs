//! Shared deterministic types for planner core logic.
//!
//! These are the typed shapes of every service response, plus the scheduler's
//! traversal directive. Wire names are snake_case and match the JSON Schemas
//! under `schemas/`.

use serde::{Deserialize, Serialize};

use crate::task::{Priority, TaskId};

/// One child task proposed by a decomposition verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub description: String,
    pub requirements_for_success: String,
    pub priority: Priority,
}

/// Classifier decision for a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict")]
pub enum Verdict {
    /// The task cannot proceed yet. No store mutation.
    #[serde(rename = "not_ready")]
    NotReady {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing_dependencies: Option<Vec<String>>,
    },
    /// The task is too coarse; each subtask becomes a child task.
    #[serde(rename = "decompose")]
    NeedsDecomposition { subtasks: Vec<SubtaskSpec> },
    /// The task can be executed directly with `prompt`.
    #[serde(rename = "execute")]
    ReadyToExecute { prompt: String },
}

impl Verdict {
    pub fn kind(&self) -> &'static str {
        match self {
            Verdict::NotReady { .. } => "not_ready",
            Verdict::NeedsDecomposition { .. } => "decompose",
            Verdict::ReadyToExecute { .. } => "execute",
        }
    }
}

/// Evaluator decision after an execution round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Complete,
    Continue,
    Defer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub status: CompletionStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Artifacts the generation backend considers relevant to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantPaths {
    pub paths: Vec<String>,
}

/// Where the generation backend wants an artifact written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveLocation {
    pub path: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Structured result of a content generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub content: String,
    pub summary_of_work_done: String,
}

/// Scheduler traversal control after processing a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    /// Move on to the next candidate of the current pass.
    Advance,
    /// Reprocess the same task before any sibling.
    Retry,
}

/// What the scheduler did with the task it processed in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    NotReady {
        reason: String,
    },
    Decomposed {
        children: Vec<TaskId>,
    },
    /// Executed and evaluated; the ledger grew by one entry.
    Executed {
        status: CompletionStatus,
        work_summary: String,
    },
    /// A service call failed; the task is revisited on a later pass.
    Failed {
        error: String,
    },
}
