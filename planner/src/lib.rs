//! Recursive task planner/executor.
//!
//! Given a single high-level goal, the planner repeatedly decomposes work into a
//! tree of smaller tasks, decides per task whether it is ready to run, executes
//! ready tasks against an external generation backend, records results, and
//! evaluates whether each task is finished. All state lives on disk so a long
//! plan can be resumed by a later run.
//!
//! - **[`core`]**: Pure, deterministic logic (selection, decomposition, invariants).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (task store, artifacts, backend process).
//! - **[`agents`]**: Service call sites built on the backend (classifier,
//!   evaluator, context resolution, save location, generation).
//!
//! [`scheduler`] ties these together into the stack-based scheduling loop.

pub mod agents;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod scheduler;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
