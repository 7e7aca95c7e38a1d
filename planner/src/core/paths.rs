//! Artifact path normalization.
//!
//! Artifact paths are `/`-separated and relative to the artifact root. Anything
//! that could escape the root is rejected rather than repaired.

use std::path::Path;

/// Extension appended when a resolved save location has none.
pub const DEFAULT_EXTENSION: &str = "txt";

/// Normalize a backend-supplied path into a root-relative artifact path.
///
/// Leading `/`, `./` and empty or `.` segments are dropped; backslashes are
/// treated as separators. Returns `None` for empty paths or any `..` segment.
pub fn normalize_artifact_path(raw: &str) -> Option<String> {
    let unified = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment.trim() {
            "" | "." => continue,
            ".." => return None,
            part => segments.push(part),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Append [`DEFAULT_EXTENSION`] when the final segment has no extension.
pub fn with_default_extension(path: &str) -> String {
    let has_extension = Path::new(path)
        .extension()
        .is_some_and(|ext| !ext.is_empty());
    if has_extension {
        path.to_string()
    } else {
        format!("{path}.{DEFAULT_EXTENSION}")
    }
}
