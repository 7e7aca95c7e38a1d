//! Per-iteration records under `.planner/iterations/<iter>/`.
//!
//! Backend outputs and transcripts for an iteration land in the same directory,
//! written by the agents; this module owns `meta.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::{Directive, StepAction};
use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationMeta {
    pub iter: u32,
    pub task_id: TaskId,
    pub action: StepAction,
    pub directive: Directive,
    /// Traversal stack after the step.
    pub stack: Vec<TaskId>,
    pub duration_ms: u64,
}

pub fn meta_path(iter_dir: &Path) -> PathBuf {
    iter_dir.join("meta.json")
}

pub fn write_iteration_meta(iter_dir: &Path, meta: &IterationMeta) -> Result<PathBuf> {
    fs::create_dir_all(iter_dir)
        .with_context(|| format!("create iteration dir {}", iter_dir.display()))?;
    let path = meta_path(iter_dir);
    let mut buf = serde_json::to_string_pretty(meta).context("serialize iteration meta")?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

pub fn read_iteration_meta(iter_dir: &Path) -> Result<IterationMeta> {
    let path = meta_path(iter_dir);
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}
