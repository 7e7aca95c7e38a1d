//! Shared test helpers: task builders, response builders, a scripted backend,
//! and a scratch planner workspace.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration tests under `tests/`.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::agents::AgentConfig;
use crate::core::types::{CompletionStatus, SubtaskSpec};
use crate::io::artifacts::FsArtifactStore;
use crate::io::backend::{Backend, CallKind, ExecRequest};
use crate::io::config::load_config;
use crate::io::init::{InitOptions, PlannerPaths, init_planner};
use crate::io::task_store::TaskStore;
use crate::scheduler::Scheduler;
use crate::task::{Priority, Task, TaskId};

/// Incomplete task with deterministic text fields and an empty ledger.
pub fn task(id: TaskId, parent_id: TaskId, priority: Priority) -> Task {
    Task {
        id,
        parent_id,
        description: format!("task {id}"),
        priority,
        requirements_for_success: format!("task {id} is done"),
        work_ledger: Vec::new(),
        completed: false,
    }
}

pub fn completed_task(id: TaskId, parent_id: TaskId, priority: Priority) -> Task {
    Task {
        completed: true,
        ..task(id, parent_id, priority)
    }
}

pub fn subtask(description: &str, priority: Priority) -> SubtaskSpec {
    SubtaskSpec {
        description: description.to_string(),
        requirements_for_success: format!("{description} exists"),
        priority,
    }
}

/// Classifier response: not ready.
pub fn verdict_not_ready(reason: &str) -> Value {
    json!({
        "verdict": "not_ready",
        "reason": reason,
        "missing_dependencies": null,
        "subtasks": null,
        "prompt": null
    })
}

/// Classifier response: decompose into `(description, priority)` children.
pub fn verdict_decompose(children: &[(&str, Priority)]) -> Value {
    let subtasks: Vec<SubtaskSpec> = children
        .iter()
        .map(|(description, priority)| subtask(description, *priority))
        .collect();
    json!({
        "verdict": "decompose",
        "reason": null,
        "missing_dependencies": null,
        "subtasks": subtasks,
        "prompt": null
    })
}

/// Classifier response: ready to execute with `prompt`.
pub fn verdict_execute(prompt: &str) -> Value {
    json!({
        "verdict": "execute",
        "reason": null,
        "missing_dependencies": null,
        "subtasks": null,
        "prompt": prompt
    })
}

pub fn evaluation(status: CompletionStatus) -> Value {
    json!({ "status": status, "reason": null })
}

pub fn relevant(paths: &[&str]) -> Value {
    json!({ "paths": paths })
}

pub fn save_location(path: &str) -> Value {
    json!({ "path": path, "reason": null })
}

pub fn generated(content: &str, summary: &str) -> Value {
    json!({ "content": content, "summary_of_work_done": summary })
}

/// Agent settings rooted in a scratch directory.
pub fn agent_config(root: &Path) -> AgentConfig {
    AgentConfig {
        workdir: root.to_path_buf(),
        schema_dir: root.join(".planner/schemas"),
        prompt_budget_bytes: 40_000,
        output_limit_bytes: 10_000,
        timeout: Duration::from_secs(5),
    }
}

/// One queued reply of a [`ScriptedBackend`].
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Written as pretty JSON to the output path.
    Json(Value),
    /// Written verbatim to the output path.
    Raw(String),
    /// The call itself fails.
    Fail(String),
    /// The call succeeds without writing any output.
    Silent,
}

/// Backend replaying queued responses per call kind and recording every call
/// as `(kind, prompt)` in order.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    queues: RefCell<HashMap<CallKind, VecDeque<ScriptedResponse>>>,
    calls: RefCell<Vec<(CallKind, String)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: CallKind, response: ScriptedResponse) {
        self.queues
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push_back(response);
    }

    pub fn push_json(&self, kind: CallKind, value: Value) {
        self.push(kind, ScriptedResponse::Json(value));
    }

    pub fn push_raw(&self, kind: CallKind, raw: &str) {
        self.push(kind, ScriptedResponse::Raw(raw.to_string()));
    }

    pub fn push_fail(&self, kind: CallKind, message: &str) {
        self.push(kind, ScriptedResponse::Fail(message.to_string()));
    }

    pub fn push_silent(&self, kind: CallKind) {
        self.push(kind, ScriptedResponse::Silent);
    }

    pub fn calls(&self) -> Vec<(CallKind, String)> {
        self.calls.borrow().clone()
    }

    pub fn call_kinds(&self) -> Vec<CallKind> {
        self.calls.borrow().iter().map(|(kind, _)| *kind).collect()
    }

    /// Responses queued but never consumed.
    pub fn remaining(&self) -> usize {
        self.queues.borrow().values().map(VecDeque::len).sum()
    }
}

impl Backend for ScriptedBackend {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        self.calls
            .borrow_mut()
            .push((request.kind, request.prompt.clone()));
        let response = self
            .queues
            .borrow_mut()
            .get_mut(&request.kind)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| anyhow!("no scripted response for {}", request.kind.as_str()))?;

        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        match response {
            ScriptedResponse::Json(value) => {
                let mut buf = serde_json::to_string_pretty(&value)?;
                buf.push('\n');
                fs::write(&request.output_path, buf)?;
                Ok(())
            }
            ScriptedResponse::Raw(raw) => {
                fs::write(&request.output_path, raw)?;
                Ok(())
            }
            ScriptedResponse::Fail(message) => Err(anyhow!(message)),
            ScriptedResponse::Silent => Ok(()),
        }
    }
}

/// Initialized planner in a temporary directory with a single root task.
pub struct TestWorkspace {
    temp: TempDir,
    paths: PlannerPaths,
}

impl TestWorkspace {
    pub fn new(goal: &str) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        init_planner(
            temp.path(),
            &InitOptions {
                goal: goal.to_string(),
                requirements: format!("{goal} is achieved"),
                priority: Priority::High,
                force: false,
            },
        )?;
        let paths = PlannerPaths::new(temp.path());
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &PlannerPaths {
        &self.paths
    }

    pub fn store(&self) -> TaskStore {
        TaskStore::new(&self.paths.tasks_path)
    }

    pub fn read_tasks(&self) -> Vec<Task> {
        self.store().read_all()
    }

    pub fn write_tasks(&self, tasks: &[Task]) -> Result<()> {
        Ok(self.store().write_all(tasks)?)
    }

    pub fn artifacts(&self) -> FsArtifactStore {
        let cfg = load_config(&self.paths.config_path).unwrap_or_default();
        FsArtifactStore::new(cfg.artifact_root(self.root()))
    }

    pub fn scheduler<B: Backend>(&self, backend: B) -> Result<Scheduler<B, FsArtifactStore>> {
        let cfg = load_config(&self.paths.config_path)?;
        Scheduler::new(self.root(), &cfg, self.artifacts(), backend)
    }
}
