//! Deterministic, pure logic shared by the planner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! task collections and return deterministic outputs suitable for tests.

pub mod decompose;
pub mod invariants;
pub mod paths;
pub mod selector;
pub mod summary;
pub mod types;
