//! The worktree-provisioning boundary (SPEC_FULL §4.F, §9).
//!
//! Git worktree plumbing is out of scope at the code level — the scheduler
//! only needs "give me an isolated checkout for this task" and "I'm done
//! with it", the same way `AgentFactory` abstracts over the agent SDK.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::SchedulerError;

/// Provisions and reclaims per-task working directories.
#[async_trait]
pub trait WorktreeProvider: Send + Sync {
    /// Creates an isolated checkout for `task_id` and returns its path.
    async fn create(&self, task_id: &str) -> Result<PathBuf, SchedulerError>;

    /// Reclaims the checkout at `path`. Best-effort: callers log failures
    /// rather than propagate them, since a leaked worktree is a cleanup
    /// nuisance, not a correctness problem.
    async fn destroy(&self, task_id: &str, path: &Path) -> Result<(), SchedulerError>;
}
