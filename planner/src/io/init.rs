//! Canonical `.planner/` layout and scaffolding for a new plan.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::config::{PlannerConfig, load_config, write_config};
use super::run_state::{RunState, write_run_state};
use super::task_store::TaskStore;
use crate::io::artifacts::{ArtifactStore, FsArtifactStore};
use crate::task::{Priority, Task, TaskId};

const GITIGNORE_LINES: [&str; 2] = ["iterations/", "schemas/"];

/// All canonical paths within `.planner/` for a project root.
#[derive(Debug, Clone)]
pub struct PlannerPaths {
    pub root: PathBuf,
    pub planner_dir: PathBuf,
    pub state_dir: PathBuf,
    pub schema_dir: PathBuf,
    pub iterations_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub tasks_path: PathBuf,
    pub run_state_path: PathBuf,
    pub config_path: PathBuf,
}

impl PlannerPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let planner_dir = root.join(".planner");
        let state_dir = planner_dir.join("state");
        Self {
            root: root.clone(),
            planner_dir: planner_dir.clone(),
            state_dir: state_dir.clone(),
            schema_dir: planner_dir.join("schemas"),
            iterations_dir: planner_dir.join("iterations"),
            gitignore_path: planner_dir.join(".gitignore"),
            tasks_path: state_dir.join("tasks.json"),
            run_state_path: state_dir.join("run_state.json"),
            config_path: state_dir.join("config.toml"),
        }
    }

    /// Directory holding backend outputs and the record of one iteration.
    pub fn iteration_dir(&self, iter: u32) -> PathBuf {
        self.iterations_dir.join(iter.to_string())
    }
}

/// Options for [`init_planner`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// The high-level goal; becomes the root task's description.
    pub goal: String,
    pub requirements: String,
    pub priority: Priority,
    /// Replace an existing plan (tasks + run state) and config.
    pub force: bool,
}

/// Result of [`init_planner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    /// Id of the root task, or `None` when an existing plan was kept.
    pub root_id: Option<TaskId>,
    pub artifact_root: PathBuf,
}

/// Create `.planner/` scaffolding, config, artifact root, and the root task.
///
/// An existing non-empty plan is kept unless `force` is set.
pub fn init_planner(root: &Path, options: &InitOptions) -> Result<InitOutcome> {
    let goal = options.goal.trim();
    if goal.is_empty() {
        return Err(anyhow!("goal must be non-empty"));
    }
    let paths = PlannerPaths::new(root);
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create {}", paths.state_dir.display()))?;
    ensure_gitignore(&paths.gitignore_path)?;

    let cfg = if options.force || !paths.config_path.exists() {
        let cfg = PlannerConfig::default();
        write_config(&paths.config_path, &cfg)?;
        cfg
    } else {
        load_config(&paths.config_path)?
    };

    let artifact_root = cfg.artifact_root(root);
    FsArtifactStore::new(&artifact_root)
        .ensure_root()
        .with_context(|| format!("create artifact root {}", artifact_root.display()))?;

    let store = TaskStore::new(&paths.tasks_path);
    if !options.force && !store.read_all().is_empty() {
        info!(path = %paths.tasks_path.display(), "keeping existing plan");
        return Ok(InitOutcome {
            root_id: None,
            artifact_root,
        });
    }

    let root_task = Task::new_root(1, goal, options.requirements.trim(), options.priority);
    store.write_all(std::slice::from_ref(&root_task))?;
    write_run_state(&paths.run_state_path, &RunState::default())?;
    info!(root_id = root_task.id, "plan initialized");

    Ok(InitOutcome {
        root_id: Some(root_task.id),
        artifact_root,
    })
}

fn ensure_gitignore(path: &Path) -> Result<()> {
    let existing = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    } else {
        String::new()
    };
    let mut lines: Vec<&str> = existing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    for required in GITIGNORE_LINES {
        if !lines.contains(&required) {
            lines.push(required);
        }
    }
    lines.sort_unstable();
    lines.dedup();

    let mut out = lines.join("\n");
    out.push('\n');
    if out != existing {
        fs::write(path, out).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::run_state::load_run_state;

    fn options(goal: &str, force: bool) -> InitOptions {
        InitOptions {
            goal: goal.to_string(),
            requirements: "one page".to_string(),
            priority: Priority::High,
            force,
        }
    }

    #[test]
    fn init_creates_layout_and_root_task() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = init_planner(temp.path(), &options("summarize X", false)).expect("init");
        let paths = PlannerPaths::new(temp.path());

        assert_eq!(outcome.root_id, Some(1));
        assert!(paths.config_path.is_file());
        assert!(outcome.artifact_root.is_dir());
        let gitignore = fs::read_to_string(&paths.gitignore_path).expect("gitignore");
        assert_eq!(gitignore, "iterations/\nschemas/\n");

        let tasks = TaskStore::new(&paths.tasks_path).read_all();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_root());
        assert_eq!(tasks[0].description, "summarize X");
        assert_eq!(tasks[0].requirements_for_success, "one page");
    }

    #[test]
    fn init_keeps_existing_plan_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_planner(temp.path(), &options("first goal", false)).expect("init");
        let outcome = init_planner(temp.path(), &options("second goal", false)).expect("re-init");

        assert_eq!(outcome.root_id, None);
        let paths = PlannerPaths::new(temp.path());
        let tasks = TaskStore::new(&paths.tasks_path).read_all();
        assert_eq!(tasks[0].description, "first goal");
    }

    #[test]
    fn init_force_replaces_plan_and_resets_run_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = PlannerPaths::new(temp.path());
        init_planner(temp.path(), &options("first goal", false)).expect("init");
        write_run_state(
            &paths.run_state_path,
            &RunState {
                stack: vec![1],
                next_iter: 9,
            },
        )
        .expect("run state");

        init_planner(temp.path(), &options("second goal", true)).expect("force");

        let tasks = TaskStore::new(&paths.tasks_path).read_all();
        assert_eq!(tasks[0].description, "second goal");
        assert_eq!(
            load_run_state(&paths.run_state_path).expect("load"),
            RunState::default()
        );
    }

    #[test]
    fn init_rejects_blank_goal() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(init_planner(temp.path(), &options("   ", false)).is_err());
    }
}
