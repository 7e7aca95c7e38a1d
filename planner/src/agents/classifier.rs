//! Task classifier: decides whether a task is not ready, needs decomposition,
//! or can be executed directly.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::core::types::Verdict;
use crate::error::ServiceError;
use crate::io::backend::{Backend, CallKind};
use crate::io::prompt::PromptBuilder;
use crate::task::Task;

use super::{AgentConfig, call_backend};

pub(crate) const CLASSIFY_SCHEMA: &str = include_str!("../../schemas/classify.schema.json");

#[derive(Debug, Clone)]
pub struct Classifier {
    config: AgentConfig,
}

impl Classifier {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Classify `task` given its current children.
    ///
    /// Schema violations and structurally invalid verdicts (no subtasks, blank
    /// prompt) are [`ServiceError::Classification`]. Nothing is mutated here.
    #[instrument(skip_all, fields(task_id = task.id))]
    pub fn classify<B: Backend>(
        &self,
        backend: &B,
        iter_dir: &Path,
        task: &Task,
        children: &[&Task],
    ) -> Result<Verdict, ServiceError> {
        self.try_classify(backend, iter_dir, task, children)
            .map_err(ServiceError::classification)
    }

    fn try_classify<B: Backend>(
        &self,
        backend: &B,
        iter_dir: &Path,
        task: &Task,
        children: &[&Task],
    ) -> Result<Verdict> {
        let prompt = PromptBuilder::new(self.config.prompt_budget_bytes)
            .build_classifier(task, children)?
            .render();
        let verdict: Verdict = call_backend(
            backend,
            &self.config,
            iter_dir,
            CallKind::Classify,
            CLASSIFY_SCHEMA,
            prompt,
        )?;
        check_verdict(&verdict)?;
        debug!(verdict = verdict.kind(), "classified");
        Ok(verdict)
    }
}

fn check_verdict(verdict: &Verdict) -> Result<()> {
    match verdict {
        Verdict::NotReady { .. } => Ok(()),
        Verdict::NeedsDecomposition { subtasks } => {
            if subtasks.is_empty() {
                return Err(anyhow!("decompose verdict has no subtasks"));
            }
            if let Some(idx) = subtasks
                .iter()
                .position(|spec| spec.description.trim().is_empty())
            {
                return Err(anyhow!("subtask {idx} has a blank description"));
            }
            Ok(())
        }
        Verdict::ReadyToExecute { prompt } => {
            if prompt.trim().is_empty() {
                return Err(anyhow!("execute verdict has a blank prompt"));
            }
            Ok(())
        }
    }
}
