//! Scheduler bookkeeping persisted between runs (`.planner/state/run_state.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::task::TaskId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    /// Ancestor task ids currently being descended into, outermost first.
    pub stack: Vec<TaskId>,
    /// Next iteration number (1-indexed, monotonically increasing).
    pub next_iter: u32,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            next_iter: 1,
        }
    }
}

/// Load run state, or the default if none was persisted yet.
pub fn load_run_state(path: &Path) -> Result<RunState> {
    if !path.exists() {
        debug!(path = %path.display(), "no run state, using default");
        return Ok(RunState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run state {}", path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;
    debug!(stack = ?state.stack, next_iter = state.next_iter, "run state loaded");
    Ok(state)
}

/// Atomically write run state to disk (temp file + rename).
pub fn write_run_state(path: &Path, state: &RunState) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("run state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp run state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace run state {}", path.display()))?;
    Ok(())
}
