//! Artifact store: a hierarchical namespace of text files under a fixed root.
//!
//! Paths crossing this boundary are `/`-separated and relative to the root.
//! Directories are never listed, only files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::core::paths::normalize_artifact_path;
use crate::error::ArtifactError;

/// Operations the planner needs from an artifact backend.
pub trait ArtifactStore {
    /// Create the root if it does not exist yet.
    fn ensure_root(&self) -> Result<(), ArtifactError>;
    /// All artifact paths, recursively, sorted.
    fn list(&self) -> Result<Vec<String>, ArtifactError>;
    /// Fails with [`ArtifactError::NotFound`] if absent.
    fn read_text(&self, path: &str) -> Result<String, ArtifactError>;
    /// Creates parent directories and overwrites any existing artifact.
    fn write_text(&self, path: &str, content: &str) -> Result<(), ArtifactError>;
    fn delete(&self, path: &str) -> Result<(), ArtifactError>;
}

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), ArtifactError> {
        let normalized =
            normalize_artifact_path(path).ok_or_else(|| ArtifactError::InvalidPath(path.to_string()))?;
        let full = normalized
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment));
        Ok((normalized, full))
    }
}

fn io_error(path: &str, source: std::io::Error) -> ArtifactError {
    if source.kind() == ErrorKind::NotFound {
        return ArtifactError::NotFound(path.to_string());
    }
    ArtifactError::Io {
        path: path.to_string(),
        source,
    }
}

impl ArtifactStore for FsArtifactStore {
    fn ensure_root(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.root).map_err(|source| ArtifactError::Io {
            path: self.root.display().to_string(),
            source,
        })
    }

    fn list(&self) -> Result<Vec<String>, ArtifactError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| ArtifactError::Io {
                path: self.root.display().to_string(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let segments: Vec<String> = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect();
            paths.push(segments.join("/"));
        }
        paths.sort();
        debug!(root = %self.root.display(), count = paths.len(), "listed artifacts");
        Ok(paths)
    }

    fn read_text(&self, path: &str) -> Result<String, ArtifactError> {
        let (normalized, full) = self.resolve(path)?;
        if full.is_dir() {
            return Err(ArtifactError::NotFound(normalized));
        }
        fs::read_to_string(&full).map_err(|err| io_error(&normalized, err))
    }

    fn write_text(&self, path: &str, content: &str) -> Result<(), ArtifactError> {
        let (normalized, full) = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error(&normalized, err))?;
        }
        fs::write(&full, content).map_err(|err| io_error(&normalized, err))?;
        debug!(path = %normalized, bytes = content.len(), "wrote artifact");
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), ArtifactError> {
        let (normalized, full) = self.resolve(path)?;
        if full.is_dir() {
            return Err(ArtifactError::NotFound(normalized));
        }
        fs::remove_file(&full).map_err(|err| io_error(&normalized, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsArtifactStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path().join("workspace"));
        (temp, store)
    }

    #[test]
    fn list_on_missing_root_is_empty() {
        let (_temp, store) = store();
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn list_is_recursive_sorted_and_skips_directories() {
        let (_temp, store) = store();
        store.ensure_root().expect("root");
        store.write_text("b.md", "b").expect("write b");
        store.write_text("docs/a.md", "a").expect("write a");
        store.write_text("docs/deep/c.txt", "c").expect("write c");
        fs::create_dir_all(store.root().join("empty")).expect("empty dir");

        assert_eq!(
            store.list().expect("list"),
            vec!["b.md", "docs/a.md", "docs/deep/c.txt"]
        );
    }

    #[test]
    fn write_overwrites_in_full() {
        let (_temp, store) = store();
        store.write_text("notes.txt", "a long first draft").expect("first");
        store.write_text("notes.txt", "short").expect("second");
        assert_eq!(store.read_text("notes.txt").expect("read"), "short");
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_temp, store) = store();
        store.ensure_root().expect("root");
        let err = store.read_text("nope.md").unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(path) if path == "nope.md"));
    }

    #[test]
    fn delete_removes_artifact() {
        let (_temp, store) = store();
        store.write_text("docs/a.md", "a").expect("write");
        store.delete("docs/a.md").expect("delete");
        assert!(store.list().expect("list").is_empty());
        assert!(matches!(
            store.delete("docs/a.md"),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn rejects_paths_escaping_root() {
        let (_temp, store) = store();
        let err = store.write_text("../outside.txt", "x").unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPath(_)));
    }
}
