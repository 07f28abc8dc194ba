//! The Scheduler — dependency-graph construction and concurrent dispatch of
//! planned tasks onto Workers (SPEC_FULL §4.F).
//!
//! Grounded on the teacher corpus's `modes/deepthink.rs` for the
//! `Semaphore`-bounded `JoinSet` fan-out/fan-in idiom, generalized from a
//! fixed strategy count to a dependency-ordered, continuously-refilled task
//! pool.

mod graph;
mod scheduler_impl;
mod worktree;

pub use graph::{
    blocking_conflict, dependencies_satisfied, package_scope, select_parallel_set,
    warns_package_overlap,
};
pub use scheduler_impl::{
    AgentFactoryProvider, Scheduler, SchedulerConfig, SchedulerError, TaskOutcome,
};
pub use worktree::WorktreeProvider;
