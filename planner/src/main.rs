//! `planner` command-line interface.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use planner::core::selector::{head_candidate, unwind_stack};
use planner::core::summary::render_task_tree;
use planner::core::types::StepAction;
use planner::exit_codes;
use planner::io::artifacts::FsArtifactStore;
use planner::io::backend::CodexBackend;
use planner::io::config::load_config;
use planner::io::init::{InitOptions, PlannerPaths, init_planner};
use planner::io::run_state::load_run_state;
use planner::io::task_store::TaskStore;
use planner::logging;
use planner::scheduler::{RunStop, Scheduler};
use planner::task::Priority;

#[derive(Parser)]
#[command(
    name = "planner",
    version,
    about = "Recursive task planner: decompose a goal, execute ready tasks, evaluate progress"
)]
struct Cli {
    /// Project root holding `.planner/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.planner/` scaffolding, config, and the root task.
    Init {
        /// The high-level goal.
        #[arg(long)]
        goal: String,
        /// Acceptance criteria for the goal.
        #[arg(long, default_value = "")]
        requirements: String,
        #[arg(long, default_value = "high")]
        priority: Priority,
        /// Replace an existing plan and config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the scheduling loop until the plan completes or the budget runs out.
    Run {
        /// Overrides `max_iterations` from config.
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Print the id of the task the next step would process.
    Select,
    /// Print the task tree.
    Status,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init {
            goal,
            requirements,
            priority,
            force,
        } => cmd_init(
            &cli.root,
            &InitOptions {
                goal,
                requirements,
                priority,
                force,
            },
        ),
        Command::Run { max_iterations } => cmd_run(&cli.root, max_iterations),
        Command::Select => cmd_select(&cli.root),
        Command::Status => cmd_status(&cli.root),
    }
}

fn cmd_init(root: &Path, options: &InitOptions) -> Result<i32> {
    let outcome = init_planner(root, options)?;
    match outcome.root_id {
        Some(id) => println!("created root task {id}"),
        None => println!("plan already exists (use --force to replace it)"),
    }
    println!("artifacts: {}", outcome.artifact_root.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, max_iterations: Option<u32>) -> Result<i32> {
    let paths = PlannerPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let store = TaskStore::new(&paths.tasks_path);
    if store.read_all().is_empty() {
        return Err(anyhow!(
            "no tasks in {} (run `planner init --goal ...` first)",
            paths.tasks_path.display()
        ));
    }
    let budget = max_iterations.unwrap_or(cfg.max_iterations);
    if budget == 0 {
        return Err(anyhow!("--max-iterations must be > 0"));
    }

    let artifacts = FsArtifactStore::new(cfg.artifact_root(root));
    let backend = CodexBackend::from_config(&cfg.backend);
    let mut scheduler = Scheduler::new(root, &cfg, artifacts, backend)?;
    let outcome = scheduler.run(budget, |step| {
        println!(
            "iter {}: task {} {} ({:?})",
            step.iter,
            step.task_id,
            describe(&step.action),
            step.directive
        );
    })?;

    match outcome.stop {
        RunStop::Complete => {
            println!("plan complete after {} step(s)", outcome.steps);
            Ok(exit_codes::OK)
        }
        RunStop::BudgetExhausted => {
            println!("iteration budget exhausted after {} step(s)", outcome.steps);
            Ok(exit_codes::BUDGET_EXHAUSTED)
        }
    }
}

fn describe(action: &StepAction) -> String {
    match action {
        StepAction::NotReady { reason } => format!("not ready: {reason}"),
        StepAction::Decomposed { children } => format!("decomposed into {children:?}"),
        StepAction::Executed { status, .. } => format!("executed, {status:?}"),
        StepAction::Failed { error } => format!("failed: {error}"),
    }
}

fn cmd_select(root: &Path) -> Result<i32> {
    let paths = PlannerPaths::new(root);
    let tasks = TaskStore::new(&paths.tasks_path).read_all();
    let mut state = load_run_state(&paths.run_state_path)
        .with_context(|| format!("load {}", paths.run_state_path.display()))?;
    unwind_stack(&tasks, &mut state.stack);
    match head_candidate(&tasks, &state.stack) {
        Some(task) => {
            println!("{}", task.id);
            Ok(exit_codes::OK)
        }
        None => Ok(exit_codes::COMPLETE),
    }
}

fn cmd_status(root: &Path) -> Result<i32> {
    let paths = PlannerPaths::new(root);
    let tasks = TaskStore::new(&paths.tasks_path).read_all();
    let state = load_run_state(&paths.run_state_path)
        .with_context(|| format!("load {}", paths.run_state_path.display()))?;
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(exit_codes::OK);
    }
    let open = tasks.iter().filter(|task| !task.completed).count();
    println!("{}", render_task_tree(&tasks, &state.stack));
    println!(
        "{open} open / {} total, stack {:?}, next iteration {}",
        tasks.len(),
        state.stack,
        state.next_iter
    );
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_with_defaults() {
        let cli = Cli::parse_from(["planner", "init", "--goal", "write a report"]);
        assert_eq!(cli.root, PathBuf::from("."));
        let Command::Init {
            goal,
            priority,
            force,
            ..
        } = cli.command
        else {
            panic!("expected init");
        };
        assert_eq!(goal, "write a report");
        assert_eq!(priority, Priority::High);
        assert!(!force);
    }

    #[test]
    fn parse_run_with_budget_and_root() {
        let cli = Cli::parse_from(["planner", "run", "--max-iterations", "5", "--root", "/tmp/x"]);
        assert_eq!(cli.root, PathBuf::from("/tmp/x"));
        assert!(matches!(
            cli.command,
            Command::Run {
                max_iterations: Some(5)
            }
        ));
    }

    #[test]
    fn rejects_unknown_priority() {
        assert!(Cli::try_parse_from(["planner", "init", "--goal", "g", "--priority", "urgent"]).is_err());
    }
}
