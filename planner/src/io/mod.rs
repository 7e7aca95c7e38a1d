//! I/O helpers for planner commands.

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod init;
pub mod iteration_log;
pub mod process;
pub mod prompt;
pub mod run_state;
pub mod task_store;
