//! The Merge Queue ("Elevator") — serializes completed worktrees onto trunk
//! (SPEC_FULL §4.G).

mod backend;
mod queue;

pub use backend::{MergeBackend, RebaseOutcome};
pub use queue::{MergeItem, MergeQueue, MergeQueueError, MergeResult};
