//! Work context resolution: which existing artifacts a prompt should see.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::RelevantPaths;
use crate::io::artifacts::ArtifactStore;
use crate::io::backend::{Backend, CallKind};
use crate::io::prompt::PromptBuilder;

use super::{AgentConfig, call_backend};

pub(crate) const RELEVANCE_SCHEMA: &str = include_str!("../../schemas/relevance.schema.json");

/// Load the artifacts the backend deems relevant to `prompt`.
///
/// Returns `path\ncontent` blocks joined by blank lines, in the order the
/// backend listed them. With no artifacts at all the backend is not consulted.
/// Suggested paths outside the listing are ignored and unreadable artifacts
/// are skipped.
#[instrument(skip_all)]
pub fn resolve_context<B: Backend, A: ArtifactStore>(
    backend: &B,
    artifacts: &A,
    config: &AgentConfig,
    iter_dir: &Path,
    prompt: &str,
) -> Result<String> {
    let listing = artifacts.list().context("list artifacts")?;
    if listing.is_empty() {
        debug!("no artifacts; empty context");
        return Ok(String::new());
    }

    let request = PromptBuilder::new(config.prompt_budget_bytes)
        .build_relevance(prompt, &listing)?
        .render();
    let relevant: RelevantPaths = call_backend(
        backend,
        config,
        iter_dir,
        CallKind::Relevance,
        RELEVANCE_SCHEMA,
        request,
    )?;

    let mut seen: Vec<&str> = Vec::new();
    let mut blocks = Vec::new();
    for path in &relevant.paths {
        let path = path.trim();
        if !listing.iter().any(|known| known == path) {
            debug!(path, "ignoring path outside artifact listing");
            continue;
        }
        if seen.contains(&path) {
            continue;
        }
        seen.push(path);
        match artifacts.read_text(path) {
            Ok(content) => blocks.push(format!("{path}\n{content}")),
            Err(err) => debug!(path, error = %err, "dropping unreadable artifact"),
        }
    }
    debug!(selected = blocks.len(), listed = listing.len(), "context resolved");
    Ok(blocks.join("\n\n"))
}
