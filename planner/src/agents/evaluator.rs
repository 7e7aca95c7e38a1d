//! Completion evaluator.

use std::path::Path;

use tracing::{debug, instrument};

use crate::core::types::Evaluation;
use crate::error::ServiceError;
use crate::io::backend::{Backend, CallKind};
use crate::io::prompt::PromptBuilder;
use crate::task::Task;

use super::{AgentConfig, call_backend};

pub(crate) const EVALUATE_SCHEMA: &str = include_str!("../../schemas/evaluate.schema.json");

#[derive(Debug, Clone)]
pub struct Evaluator {
    config: AgentConfig,
}

impl Evaluator {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Judge progress from the task's description, requirements, and ledger.
    #[instrument(skip_all, fields(task_id = task.id, ledger_len = task.work_ledger.len()))]
    pub fn evaluate<B: Backend>(
        &self,
        backend: &B,
        iter_dir: &Path,
        task: &Task,
    ) -> Result<Evaluation, ServiceError> {
        let prompt = PromptBuilder::new(self.config.prompt_budget_bytes)
            .build_evaluator(task)
            .map_err(ServiceError::evaluation)?
            .render();
        let evaluation: Evaluation = call_backend(
            backend,
            &self.config,
            iter_dir,
            CallKind::Evaluate,
            EVALUATE_SCHEMA,
            prompt,
        )
        .map_err(ServiceError::evaluation)?;
        debug!(status = ?evaluation.status, "evaluated");
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CompletionStatus;
    use crate::task::{Priority, WorkEntry};
    use crate::test_support::{ScriptedBackend, agent_config, evaluation, task};
    use serde_json::json;

    #[test]
    fn evaluates_with_ledger_in_prompt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let evaluator = Evaluator::new(agent_config(temp.path()));
        let mut t = task(5, 1, Priority::Medium);
        t.work_ledger.push(WorkEntry {
            work_summary: "wrote section one".to_string(),
        });
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::Evaluate, evaluation(CompletionStatus::Continue));

        let got = evaluator
            .evaluate(&backend, &temp.path().join("iter"), &t)
            .expect("evaluate");

        assert_eq!(got.status, CompletionStatus::Continue);
        let (kind, prompt) = backend.calls().remove(0);
        assert_eq!(kind, CallKind::Evaluate);
        assert!(prompt.contains("### Evaluator Contract"));
        assert!(prompt.contains("wrote section one"));
    }

    #[test]
    fn unknown_status_is_an_evaluation_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let evaluator = Evaluator::new(agent_config(temp.path()));
        let backend = ScriptedBackend::new();
        backend.push_json(
            CallKind::Evaluate,
            json!({"status": "finished", "reason": null}),
        );

        let err = evaluator
            .evaluate(&backend, &temp.path().join("iter"), &task(1, 0, Priority::Low))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Evaluation(_)));
    }
}
