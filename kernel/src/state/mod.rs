//! Atomic JSON persistence and the shared task/raid document shapes.
//!
//! Every store in this crate (and the orchestrator crate built on top of it)
//! funnels its writes through [`atomic_write_json`] and its reads through
//! [`tolerant_load_json`]: temp-file-then-rename on the way out, "never
//! partially written, never fatal on the way in" on the way back.

mod atomic;
mod documents;

pub use atomic::{atomic_write_json, clean_stray_tmp, tolerant_load_json, StateError};
pub use documents::{
    AttemptRecord, CheckpointPhase, CompletedRaid, Inventory, Pocket, PlannedTask, RaidRecord,
    RaidStatus, Stash, TaskAssignment, TaskRecord, TaskStatus,
};

use std::path::{Path, PathBuf};

/// The well-known file names under a state directory (SPEC_FULL §6).
pub const POCKET_FILE: &str = "pocket.json";
pub const INVENTORY_FILE: &str = "inventory.json";
pub const STASH_FILE: &str = "stash.json";
pub const AST_INDEX_FILE: &str = "ast-index.json";
pub const CAPABILITY_LEDGER_FILE: &str = "capability-ledger.json";
pub const ERROR_FIX_PATTERNS_FILE: &str = "error-fix-patterns.json";
pub const EVENT_LOG_FILE: &str = "grind-events.jsonl";

/// Path to `tasks/<taskId>/assignment.json` under a state directory.
pub fn assignment_path(state_dir: &Path, task_id: &str) -> PathBuf {
    state_dir.join("tasks").join(task_id).join("assignment.json")
}

/// Path to `tasks/<taskId>/checkpoint.json` under a state directory.
pub fn checkpoint_path(state_dir: &Path, task_id: &str) -> PathBuf {
    state_dir.join("tasks").join(task_id).join("checkpoint.json")
}
