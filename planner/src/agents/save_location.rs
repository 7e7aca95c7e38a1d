//! Save-location resolution for generated artifacts.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::paths::{normalize_artifact_path, with_default_extension};
use crate::core::types::SaveLocation;
use crate::io::artifacts::ArtifactStore;
use crate::io::backend::{Backend, CallKind};
use crate::io::prompt::PromptBuilder;

use super::{AgentConfig, call_backend};

pub(crate) const SAVE_LOCATION_SCHEMA: &str =
    include_str!("../../schemas/save_location.schema.json");

/// Ask the backend where the artifact for `prompt` belongs.
///
/// The answer is normalized to a root-relative path and given a `.txt`
/// extension when it has none. Paths that would leave the artifact root are
/// rejected.
#[instrument(skip_all)]
pub fn resolve_save_location<B: Backend, A: ArtifactStore>(
    backend: &B,
    artifacts: &A,
    config: &AgentConfig,
    iter_dir: &Path,
    prompt: &str,
) -> Result<String> {
    let listing = artifacts.list().context("list artifacts")?;
    let request = PromptBuilder::new(config.prompt_budget_bytes)
        .build_save_location(prompt, &listing)?
        .render();
    let location: SaveLocation = call_backend(
        backend,
        config,
        iter_dir,
        CallKind::SaveLocation,
        SAVE_LOCATION_SCHEMA,
        request,
    )?;

    let normalized = normalize_artifact_path(&location.path)
        .ok_or_else(|| anyhow!("invalid save location '{}'", location.path))?;
    let path = with_default_extension(&normalized);
    debug!(path = %path, reason = location.reason.as_deref().unwrap_or(""), "save location");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::artifacts::FsArtifactStore;
    use crate::test_support::{ScriptedBackend, agent_config, save_location};

    fn resolve(raw: &str) -> Result<String> {
        let temp = tempfile::tempdir().expect("tempdir");
        let artifacts = FsArtifactStore::new(temp.path().join("workspace"));
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::SaveLocation, save_location(raw));
        resolve_save_location(
            &backend,
            &artifacts,
            &agent_config(temp.path()),
            &temp.path().join("iter"),
            "write the plan",
        )
    }

    #[test]
    fn normalizes_and_adds_default_extension() {
        assert_eq!(resolve("/docs/./plan").expect("resolve"), "docs/plan.txt");
        assert_eq!(resolve("./notes.md").expect("resolve"), "notes.md");
    }

    #[test]
    fn rejects_escaping_or_empty_paths() {
        assert!(resolve("../outside.md").is_err());
        assert!(resolve("docs/../../x").is_err());
        assert!(resolve("/").unwrap_err().to_string().contains("invalid save location"));
    }

    #[test]
    fn prompt_lists_existing_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let artifacts = FsArtifactStore::new(temp.path().join("workspace"));
        artifacts.write_text("docs/intro.md", "hi").expect("write");
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::SaveLocation, save_location("docs/intro.md"));

        let path = resolve_save_location(
            &backend,
            &artifacts,
            &agent_config(temp.path()),
            &temp.path().join("iter"),
            "revise the intro",
        )
        .expect("resolve");

        assert_eq!(path, "docs/intro.md");
        let (_, prompt) = backend.calls().remove(0);
        assert!(prompt.contains("### Artifact Tree"));
        assert!(prompt.contains("- docs/intro.md"));
    }
}
