//! Error taxonomy at the planner's domain seams.
//!
//! Only [`StoreWriteError`] is fatal to a run. Service failures are caught per
//! task by the scheduler and the task is revisited on a later pass.

use std::path::PathBuf;

use thiserror::Error;

/// The persisted task collection could not be read.
///
/// Never propagated past the task store: callers see an empty collection and a
/// `warn` event instead.
#[derive(Debug, Error)]
pub enum StoreReadError {
    #[error("task store {} is missing", path.display())]
    Missing { path: PathBuf },

    #[error("read task store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse task store {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("task store {} violates invariants: {}", path.display(), errors.join("; "))]
    Invalid { path: PathBuf, errors: Vec<String> },
}

/// Replacing the persisted task collection failed.
///
/// Nothing partial is observable on disk: the previous collection stays in place.
#[derive(Debug, Error)]
#[error("write task store {}: {message}", path.display())]
pub struct StoreWriteError {
    pub path: PathBuf,
    pub message: String,
}

/// Failure of one external service call for one task.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("classification failed: {0}")]
    Classification(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl ServiceError {
    pub fn classification(err: impl Into<anyhow::Error>) -> Self {
        Self::Classification(format!("{:#}", err.into()))
    }

    pub fn generation(err: impl Into<anyhow::Error>) -> Self {
        Self::Generation(format!("{:#}", err.into()))
    }

    pub fn evaluation(err: impl Into<anyhow::Error>) -> Self {
        Self::Evaluation(format!("{:#}", err.into()))
    }
}

/// Artifact store failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact '{0}' not found")]
    NotFound(String),

    #[error("artifact path '{0}' is not a relative path inside the artifact root")]
    InvalidPath(String),

    #[error("artifact io '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of processing one task inside a scheduling step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    StoreWrite(#[from] StoreWriteError),
}
