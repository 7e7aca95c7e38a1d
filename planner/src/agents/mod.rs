//! Service call sites built on the [`Backend`] primitive.
//!
//! Every agent renders a prompt, materializes its JSON Schema under
//! `.planner/schemas/`, and loads the validated response from the iteration
//! directory. Agents map failures into the matching [`crate::error::ServiceError`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::io::backend::{Backend, CallKind, ExecRequest, execute_and_load_json};
use crate::io::config::PlannerConfig;
use crate::io::init::PlannerPaths;

pub mod classifier;
pub mod context;
pub mod evaluator;
pub mod executor;
pub mod save_location;

/// Settings shared by every agent invocation.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Working directory for backend processes.
    pub workdir: PathBuf,
    pub schema_dir: PathBuf,
    pub prompt_budget_bytes: usize,
    pub output_limit_bytes: usize,
    pub timeout: Duration,
}

impl AgentConfig {
    pub fn from_config(paths: &PlannerPaths, cfg: &PlannerConfig) -> Self {
        Self {
            workdir: paths.root.clone(),
            schema_dir: paths.schema_dir.clone(),
            prompt_budget_bytes: cfg.prompt_budget_bytes,
            output_limit_bytes: cfg.output_limit_bytes,
            timeout: cfg.call_timeout(),
        }
    }
}

pub(crate) fn write_output_schema(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create schema dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write schema {}", path.display()))
}

/// One backend round trip: schema on disk, prompt in, typed response out.
///
/// Output and transcript land in `iter_dir` as `<kind>.output.json` and
/// `<kind>.log`. A stale output from an interrupted earlier attempt is removed
/// first so it can never be mistaken for this call's response.
pub(crate) fn call_backend<B: Backend, T: DeserializeOwned>(
    backend: &B,
    config: &AgentConfig,
    iter_dir: &Path,
    kind: CallKind,
    schema: &str,
    prompt: String,
) -> Result<T> {
    let schema_path = config
        .schema_dir
        .join(format!("{}.schema.json", kind.as_str()));
    write_output_schema(&schema_path, schema)?;
    let schema_value: Value = serde_json::from_str(schema)
        .with_context(|| format!("parse {} schema", kind.as_str()))?;

    let output_path = iter_dir.join(format!("{}.output.json", kind.as_str()));
    if output_path.exists() {
        fs::remove_file(&output_path)
            .with_context(|| format!("remove stale output {}", output_path.display()))?;
    }
    debug!(kind = kind.as_str(), prompt_bytes = prompt.len(), "calling backend");

    let request = ExecRequest {
        kind,
        workdir: config.workdir.clone(),
        prompt,
        output_schema_path: schema_path,
        output_path,
        log_path: iter_dir.join(format!("{}.log", kind.as_str())),
        timeout: config.timeout,
        output_limit_bytes: config.output_limit_bytes,
    };
    execute_and_load_json(backend, &request, &schema_value)
}
