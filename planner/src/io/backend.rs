//! Backend abstraction for external service calls.
//!
//! Every service the planner consults (classifier, evaluator, generation) is a
//! single request/response primitive: a prompt plus a JSON Schema in, one JSON
//! document out. The [`Backend`] trait decouples the agents from the actual
//! backend (an agent CLI such as `codex exec`). Tests use scripted backends that
//! write predetermined outputs without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::io::config::BackendConfig;
use crate::io::process::{ProcessLimits, run_with_timeout};

/// Which service call a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Classify,
    Relevance,
    SaveLocation,
    Generate,
    Evaluate,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Classify => "classify",
            CallKind::Relevance => "relevance",
            CallKind::SaveLocation => "save_location",
            CallKind::Generate => "generate",
            CallKind::Evaluate => "evaluate",
        }
    }
}

/// Parameters for a backend invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub kind: CallKind,
    /// Working directory for the backend process.
    pub workdir: PathBuf,
    /// Prompt text fed on stdin.
    pub prompt: String,
    /// JSON Schema constraining the response.
    pub output_schema_path: PathBuf,
    /// Where the backend must write its JSON response.
    pub output_path: PathBuf,
    /// Where the backend's stdout/stderr transcript goes.
    pub log_path: PathBuf,
    pub timeout: Duration,
    /// Truncate backend logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over service backends.
pub trait Backend {
    /// Run one call. Must write the JSON response to `request.output_path`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        (**self).exec(request)
    }
}

/// Backend that spawns a codex-compatible agent CLI.
#[derive(Debug, Clone)]
pub struct CodexBackend {
    command: Vec<String>,
}

impl CodexBackend {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub fn from_config(cfg: &BackendConfig) -> Self {
        Self::new(cfg.command.clone())
    }
}

impl Backend for CodexBackend {
    #[instrument(skip_all, fields(kind = request.kind.as_str(), timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("backend command is empty"))?;
        if !request.output_schema_path.exists() {
            return Err(anyhow!(
                "missing output schema {}",
                request.output_schema_path.display()
            ));
        }
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
        info!(program = %program, "starting backend call");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--sandbox")
            .arg("read-only")
            // Workspaces are not required to be git repositories.
            .arg("--skip-git-repo-check")
            .arg("--output-schema")
            .arg(&request.output_schema_path)
            .arg("--output-last-message")
            .arg(&request.output_path)
            .arg("-")
            .current_dir(&request.workdir);

        let output = run_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            ProcessLimits {
                timeout: request.timeout,
                output_limit_bytes: request.output_limit_bytes,
            },
        )
        .with_context(|| format!("run {program}"))?;
        write_log(&request.log_path, &output.transcript())?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "backend call timed out");
            return Err(anyhow!("{program} timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "backend call failed");
            return Err(anyhow!(
                "{program} failed with status {:?}",
                output.status.code()
            ));
        }
        debug!("backend call completed");
        Ok(())
    }
}

/// Run the backend, then load its response validated against `schema`.
#[instrument(skip_all, fields(kind = request.kind.as_str()))]
pub fn execute_and_load_json<B: Backend, T: DeserializeOwned>(
    backend: &B,
    request: &ExecRequest,
    schema: &Value,
) -> Result<T> {
    backend.exec(request)?;
    if !request.output_path.exists() {
        return Err(anyhow!(
            "missing backend output {}",
            request.output_path.display()
        ));
    }
    let contents = fs::read_to_string(&request.output_path)
        .with_context(|| format!("read backend output {}", request.output_path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", request.output_path.display()))?;
    validate_against_schema(schema, &value)?;
    let parsed = serde_json::from_value(value)
        .with_context(|| format!("deserialize {}", request.output_path.display()))?;
    Ok(parsed)
}

/// Validate a JSON instance against a JSON Schema.
pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<()> {
    let validator = validator_for(schema).map_err(|err| anyhow!("invalid schema: {err}"))?;
    let messages: Vec<String> = validator
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "response does not match schema: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_log(path: &Path, transcript: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    fs::write(path, transcript).with_context(|| format!("write backend log {}", path.display()))
}
