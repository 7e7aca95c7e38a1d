//! Stable exit codes for planner CLI commands.

/// Command succeeded (or `planner run` finished the whole plan).
pub const OK: i32 = 0;
/// Invalid config/layout, unwritable store, or any other fatal error.
pub const INVALID: i32 = 1;
/// `planner select` found no candidate task (plan complete).
pub const COMPLETE: i32 = 2;
/// `planner run` stopped because the iteration budget ran out.
pub const BUDGET_EXHAUSTED: i32 = 3;
