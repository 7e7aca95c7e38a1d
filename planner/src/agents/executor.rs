//! Task executor: turns a ready task's prompt into one persisted artifact.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::types::GeneratedArtifact;
use crate::error::ServiceError;
use crate::io::artifacts::ArtifactStore;
use crate::io::backend::{Backend, CallKind};
use crate::io::prompt::PromptBuilder;

use super::context::resolve_context;
use super::save_location::resolve_save_location;
use super::{AgentConfig, call_backend};

pub(crate) const GENERATE_SCHEMA: &str = include_str!("../../schemas/generate.schema.json");

#[derive(Debug, Clone)]
pub struct TaskExecutor {
    config: AgentConfig,
}

impl TaskExecutor {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Resolve context and a save location, generate, and write the artifact.
    ///
    /// Returns the backend's summary of the work done. Any failure along the
    /// way is a [`ServiceError::Generation`] and leaves no ledger trace; an
    /// artifact is only written once generation succeeded.
    #[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
    pub fn execute<B: Backend, A: ArtifactStore>(
        &self,
        backend: &B,
        artifacts: &A,
        iter_dir: &Path,
        prompt: &str,
        prior_work: &str,
    ) -> Result<String, ServiceError> {
        self.try_execute(backend, artifacts, iter_dir, prompt, prior_work)
            .map_err(ServiceError::generation)
    }

    fn try_execute<B: Backend, A: ArtifactStore>(
        &self,
        backend: &B,
        artifacts: &A,
        iter_dir: &Path,
        prompt: &str,
        prior_work: &str,
    ) -> Result<String> {
        let context = resolve_context(backend, artifacts, &self.config, iter_dir, prompt)
            .context("resolve work context")?;
        let path = resolve_save_location(backend, artifacts, &self.config, iter_dir, prompt)
            .context("resolve save location")?;

        let request = PromptBuilder::new(self.config.prompt_budget_bytes)
            .build_generator(&context, prior_work, prompt)?
            .render();
        let generated: GeneratedArtifact = call_backend(
            backend,
            &self.config,
            iter_dir,
            CallKind::Generate,
            GENERATE_SCHEMA,
            request,
        )
        .context("generate artifact")?;

        artifacts
            .write_text(&path, &generated.content)
            .with_context(|| format!("write artifact {path}"))?;
        info!(path = %path, bytes = generated.content.len(), "artifact written");
        Ok(generated.summary_of_work_done)
    }
}
