//! Stack-based recursive scheduling loop.
//!
//! The scheduler keeps a traversal stack of parent ids (persisted in run state)
//! and a pass queue of candidate ids for the current level. Each step works the
//! head of the queue: classify, then either decompose (descend one level) or
//! execute and evaluate. Per-task service failures are logged and skipped;
//! only task store writes abort a run.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::agents::AgentConfig;
use crate::agents::classifier::Classifier;
use crate::agents::evaluator::Evaluator;
use crate::agents::executor::TaskExecutor;
use crate::core::decompose::{build_children, children_of};
use crate::core::selector::{head_candidate, select_candidates, unwind_stack};
use crate::core::types::{CompletionStatus, Directive, StepAction, Verdict};
use crate::error::{StepError, StoreWriteError};
use crate::io::artifacts::ArtifactStore;
use crate::io::backend::Backend;
use crate::io::config::PlannerConfig;
use crate::io::init::PlannerPaths;
use crate::io::iteration_log::{IterationMeta, write_iteration_meta};
use crate::io::run_state::{RunState, load_run_state, write_run_state};
use crate::io::task_store::TaskStore;
use crate::task::{Task, TaskId, WorkEntry};

/// Result of one processed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Iteration number (1-indexed, continues across runs).
    pub iter: u32,
    pub task_id: TaskId,
    pub action: StepAction,
    pub directive: Directive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// No candidate is left at the empty stack.
    Complete,
    Stepped(StepOutcome),
}

/// Reason why [`Scheduler::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStop {
    Complete,
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub steps: u32,
    pub stop: RunStop,
}

pub struct Scheduler<B, A> {
    paths: PlannerPaths,
    store: TaskStore,
    artifacts: A,
    backend: B,
    classifier: Classifier,
    evaluator: Evaluator,
    executor: TaskExecutor,
    state: RunState,
    /// Candidate ids of the current pass; the head is worked next.
    queue: VecDeque<TaskId>,
}

impl<B: Backend, A: ArtifactStore> Scheduler<B, A> {
    /// Load run state for `root` and unwind stack entries that no longer
    /// have anything to schedule.
    pub fn new(root: &Path, cfg: &PlannerConfig, artifacts: A, backend: B) -> Result<Self> {
        let paths = PlannerPaths::new(root);
        let mut state = load_run_state(&paths.run_state_path)
            .with_context(|| format!("load {}", paths.run_state_path.display()))?;
        let store = TaskStore::new(&paths.tasks_path);
        let popped = unwind_stack(&store.read_all(), &mut state.stack);
        if !popped.is_empty() {
            debug!(?popped, "unwound stale stack entries on load");
        }
        artifacts
            .ensure_root()
            .context("create artifact root")?;

        let agent_config = AgentConfig::from_config(&paths, cfg);
        Ok(Self {
            store,
            artifacts,
            backend,
            classifier: Classifier::new(agent_config.clone()),
            evaluator: Evaluator::new(agent_config.clone()),
            executor: TaskExecutor::new(agent_config),
            state,
            queue: VecDeque::new(),
            paths,
        })
    }

    pub fn stack(&self) -> &[TaskId] {
        &self.state.stack
    }

    pub fn next_iter(&self) -> u32 {
        self.state.next_iter
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The task the next step would process, if any.
    ///
    /// Leaves the stack and pass queue as they are.
    pub fn peek(&self) -> Option<Task> {
        let tasks = self.store.read_all();
        let queued = self
            .queue
            .iter()
            .find(|&&id| tasks.iter().any(|task| task.id == id && !task.completed))
            .copied();
        let id = queued.or_else(|| {
            let mut stack = self.state.stack.clone();
            unwind_stack(&tasks, &mut stack);
            head_candidate(&tasks, &stack).map(|task| task.id)
        })?;
        tasks.into_iter().find(|task| task.id == id)
    }

    /// Head of the pass queue, refilling it from the store when exhausted.
    ///
    /// Queued ids that completed meanwhile are skipped. A refill first unwinds
    /// finished stack levels, so a parent whose children are all done becomes a
    /// candidate of the level above again.
    fn next_task<'a>(&mut self, tasks: &'a [Task]) -> Option<&'a Task> {
        while let Some(&id) = self.queue.front() {
            if let Some(task) = tasks.iter().find(|task| task.id == id && !task.completed) {
                return Some(task);
            }
            self.queue.pop_front();
        }

        for id in unwind_stack(tasks, &mut self.state.stack) {
            info!(task_id = id, "all subtasks finished; leaving level");
        }
        let candidates = select_candidates(tasks, &self.state.stack);
        self.queue = candidates.iter().map(|task| task.id).collect();
        debug!(stack = ?self.state.stack, pass = ?self.queue, "new pass");
        candidates.into_iter().next()
    }

    /// Process the next candidate once.
    ///
    /// Run state is persisted after every step so a later run resumes at the
    /// same stack depth. Errors are fatal: unwritable task store, run state, or
    /// iteration record.
    pub fn step(&mut self) -> Result<StepResult> {
        let start = Instant::now();
        let tasks = self.store.read_all();
        let Some(task) = self.next_task(&tasks) else {
            write_run_state(&self.paths.run_state_path, &self.state)?;
            info!("no candidates left; plan complete");
            return Ok(StepResult::Complete);
        };
        let task_id = task.id;

        let iter = self.state.next_iter;
        let iter_dir = self.paths.iteration_dir(iter);
        let (action, directive) = match self.process(&tasks, task, &iter_dir) {
            Ok(done) => done,
            Err(StepError::Service(err)) => {
                warn!(task_id, error = %err, "service call failed; moving on");
                (
                    StepAction::Failed {
                        error: err.to_string(),
                    },
                    Directive::Advance,
                )
            }
            Err(StepError::StoreWrite(err)) => return Err(err.into()),
        };

        if directive == Directive::Advance {
            self.queue.pop_front();
        }
        self.state.next_iter = iter + 1;
        write_run_state(&self.paths.run_state_path, &self.state)?;
        write_iteration_meta(
            &iter_dir,
            &IterationMeta {
                iter,
                task_id,
                action: action.clone(),
                directive,
                stack: self.state.stack.clone(),
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
        )?;

        Ok(StepResult::Stepped(StepOutcome {
            iter,
            task_id,
            action,
            directive,
        }))
    }

    #[instrument(skip_all, fields(task_id = task.id))]
    fn process(
        &mut self,
        tasks: &[Task],
        task: &Task,
        iter_dir: &Path,
    ) -> Result<(StepAction, Directive), StepError> {
        let children = children_of(tasks, task.id);
        let verdict = self
            .classifier
            .classify(&self.backend, iter_dir, task, &children)?;

        match verdict {
            Verdict::NotReady {
                reason,
                missing_dependencies,
            } => {
                info!(reason = %reason, ?missing_dependencies, "task not ready");
                Ok((StepAction::NotReady { reason }, Directive::Advance))
            }
            Verdict::NeedsDecomposition { subtasks } => {
                let created = self.store.with_store(|all| {
                    let children = build_children(all, task.id, &subtasks);
                    let ids: Vec<TaskId> = children.iter().map(|child| child.id).collect();
                    all.extend(children);
                    ids
                })?;
                self.state.stack.push(task.id);
                self.queue.clear();
                info!(children = ?created, "task decomposed; descending");
                Ok((StepAction::Decomposed { children: created }, Directive::Advance))
            }
            Verdict::ReadyToExecute { prompt } => {
                let work_summary = self.executor.execute(
                    &self.backend,
                    &self.artifacts,
                    iter_dir,
                    &prompt,
                    &task.ledger_text(),
                )?;
                let updated = self.update(task.id, |t| {
                    t.work_ledger.push(WorkEntry {
                        work_summary: work_summary.clone(),
                    });
                })?;

                let evaluation = self.evaluator.evaluate(&self.backend, iter_dir, &updated)?;
                let directive = match evaluation.status {
                    CompletionStatus::Complete => {
                        self.update(task.id, |t| t.completed = true)?;
                        info!("task completed");
                        Directive::Advance
                    }
                    CompletionStatus::Defer => {
                        info!(reason = evaluation.reason.as_deref().unwrap_or(""), "task deferred");
                        Directive::Advance
                    }
                    CompletionStatus::Continue => {
                        debug!("task continues; retrying");
                        Directive::Retry
                    }
                };
                Ok((
                    StepAction::Executed {
                        status: evaluation.status,
                        work_summary,
                    },
                    directive,
                ))
            }
        }
    }

    fn update<F: FnOnce(&mut Task)>(&self, id: TaskId, mutator: F) -> Result<Task, StoreWriteError> {
        self.store
            .update_task(id, mutator)?
            .ok_or_else(|| StoreWriteError {
                path: self.store.path().to_path_buf(),
                message: format!("task {id} disappeared from the store"),
            })
    }

    /// Step until the plan completes or `max_iterations` steps have run.
    pub fn run<F: FnMut(&StepOutcome)>(
        &mut self,
        max_iterations: u32,
        mut on_step: F,
    ) -> Result<RunOutcome> {
        let mut steps = 0u32;
        loop {
            if steps >= max_iterations {
                let stop = if self.peek().is_some() {
                    RunStop::BudgetExhausted
                } else {
                    RunStop::Complete
                };
                info!(steps, ?stop, "iteration budget reached");
                return Ok(RunOutcome { steps, stop });
            }
            match self.step()? {
                StepResult::Complete => {
                    return Ok(RunOutcome {
                        steps,
                        stop: RunStop::Complete,
                    });
                }
                StepResult::Stepped(outcome) => {
                    steps += 1;
                    on_step(&outcome);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::CallKind;
    use crate::task::Priority;
    use crate::test_support::{
        ScriptedBackend, TestWorkspace, evaluation, generated, save_location, verdict_decompose,
        verdict_execute, verdict_not_ready,
    };

    #[test]
    fn not_ready_advances_without_mutation() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let before = ws.read_tasks();
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::Classify, verdict_not_ready("waiting on input"));
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");

        let StepResult::Stepped(outcome) = scheduler.step().expect("step") else {
            panic!("expected a step");
        };

        assert_eq!(outcome.task_id, 1);
        assert_eq!(outcome.directive, Directive::Advance);
        assert!(matches!(outcome.action, StepAction::NotReady { .. }));
        assert_eq!(ws.read_tasks(), before);
        assert_eq!(scheduler.next_iter(), 2);
    }

    #[test]
    fn decomposition_descends_into_children() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let backend = ScriptedBackend::new();
        backend.push_json(
            CallKind::Classify,
            verdict_decompose(&[("low child", Priority::Low), ("high child", Priority::High)]),
        );
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");

        scheduler.step().expect("step");

        assert_eq!(scheduler.stack(), &[1]);
        let next = scheduler.peek().expect("candidate");
        assert_eq!(next.description, "high child");
        assert_eq!(next.parent_id, 1);
    }

    #[test]
    fn service_failure_is_recorded_and_advances() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::Classify, verdict_execute("write it"));
        backend.push_json(CallKind::SaveLocation, save_location("out.md"));
        backend.push_fail(CallKind::Generate, "backend timed out");
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");

        let StepResult::Stepped(outcome) = scheduler.step().expect("step") else {
            panic!("expected a step");
        };

        let StepAction::Failed { error } = &outcome.action else {
            panic!("expected failure, got {:?}", outcome.action);
        };
        assert!(error.contains("generation failed"));
        assert!(ws.read_tasks()[0].work_ledger.is_empty());
        let meta = crate::io::iteration_log::read_iteration_meta(&ws.paths().iteration_dir(1))
            .expect("meta");
        assert_eq!(meta.action, outcome.action);
    }

    #[test]
    fn run_reports_budget_exhaustion() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::Classify, verdict_not_ready("later"));
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");

        let outcome = scheduler.run(1, |_| {}).expect("run");
        assert_eq!(
            outcome,
            RunOutcome {
                steps: 1,
                stop: RunStop::BudgetExhausted
            }
        );
    }

    #[test]
    fn queued_task_completed_elsewhere_is_skipped() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let backend = ScriptedBackend::new();
        backend.push_json(
            CallKind::Classify,
            verdict_decompose(&[("first", Priority::High), ("second", Priority::Medium)]),
        );
        backend.push_json(CallKind::Classify, verdict_not_ready("later"));
        backend.push_json(CallKind::Classify, verdict_not_ready("still later"));
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");
        scheduler.step().expect("decompose");
        let StepResult::Stepped(first) = scheduler.step().expect("step") else {
            panic!("expected a step");
        };
        assert_eq!(first.task_id, 2);

        let mut tasks = ws.read_tasks();
        for task in tasks.iter_mut().filter(|task| task.id == 3) {
            task.completed = true;
        }
        ws.write_tasks(&tasks).expect("write");

        let StepResult::Stepped(next) = scheduler.step().expect("step") else {
            panic!("expected a step");
        };
        assert_eq!(next.task_id, 2);
        assert_eq!(scheduler.stack(), &[1]);
    }

    #[test]
    fn peek_leaves_finished_level_on_stack() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let backend = ScriptedBackend::new();
        backend.push_json(
            CallKind::Classify,
            verdict_decompose(&[("only child", Priority::High)]),
        );
        backend.push_json(CallKind::Classify, verdict_execute("write it"));
        backend.push_json(CallKind::SaveLocation, save_location("out"));
        backend.push_json(CallKind::Generate, generated("body", "wrote it"));
        backend.push_json(CallKind::Evaluate, evaluation(CompletionStatus::Complete));
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");

        let outcome = scheduler.run(2, |_| {}).expect("run");

        assert_eq!(outcome.stop, RunStop::BudgetExhausted);
        assert_eq!(scheduler.peek().map(|task| task.id), Some(1));
        assert_eq!(scheduler.stack(), &[1]);
        let persisted = load_run_state(&ws.paths().run_state_path).expect("run state");
        assert_eq!(persisted.stack, scheduler.stack());
    }

    #[test]
    fn run_stops_when_plan_is_complete() {
        let ws = TestWorkspace::new("goal").expect("workspace");
        let backend = ScriptedBackend::new();
        backend.push_json(CallKind::Classify, verdict_execute("write it"));
        backend.push_json(CallKind::SaveLocation, save_location("out"));
        backend.push_json(CallKind::Generate, generated("body", "wrote it"));
        backend.push_json(CallKind::Evaluate, evaluation(CompletionStatus::Complete));
        let mut scheduler = ws.scheduler(&backend).expect("scheduler");

        let mut seen = Vec::new();
        let outcome = scheduler.run(10, |step| seen.push(step.task_id)).expect("run");

        assert_eq!(outcome.stop, RunStop::Complete);
        assert_eq!(outcome.steps, 1);
        assert_eq!(seen, vec![1]);
        assert_eq!(ws.artifacts().read_text("out.txt").expect("artifact"), "body");
    }
}
