//! The git-plumbing boundary the Merge Queue drives (SPEC_FULL §4.G).
//!
//! Rebase, fast-forward, and worktree teardown are specified only at the
//! contract level, the same way `AgentFactory` abstracts the agent SDK and
//! `WorktreeProvider` abstracts worktree creation.

use std::path::Path;

use async_trait::async_trait;

use super::MergeQueueError;

/// Result of attempting to rebase a task's branch onto current trunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    Clean,
    Conflict,
}

#[async_trait]
pub trait MergeBackend: Send + Sync {
    /// Rebases the branch checked out at `worktree` onto current trunk.
    async fn rebase_onto_trunk(&self, worktree: &Path) -> Result<RebaseOutcome, MergeQueueError>;

    /// Fast-forwards trunk to the rebased tip at `worktree`, returning the
    /// new trunk commit sha.
    async fn fast_forward_trunk(&self, worktree: &Path) -> Result<String, MergeQueueError>;

    /// Reclaims the worktree. Best-effort: callers log rather than propagate.
    async fn destroy_worktree(&self, worktree: &Path) -> Result<(), MergeQueueError>;
}
