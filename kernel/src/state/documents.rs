//! The JSON document shapes persisted under a state directory (SPEC_FULL §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `pocket.json` — pointer to the single active raid, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pocket {
    #[serde(rename = "raidId", skip_serializing_if = "Option::is_none")]
    pub raid_id: Option<String>,
    #[serde(rename = "raidStatus", skip_serializing_if = "Option::is_none")]
    pub raid_status: Option<RaidStatus>,
}

/// `inventory.json` — the active raid's aggregate state.
///
/// `waypoints` is the approved plan (the ordered task list the raid was
/// created from); `squad` is the live roster of per-task records as the
/// scheduler and workers update them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid: Option<RaidRecord>,
    #[serde(default)]
    pub waypoints: Vec<PlannedTask>,
    #[serde(default)]
    pub squad: Vec<TaskRecord>,
}

/// `stash.json` — history of completed (or surrendered) raids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stash {
    #[serde(rename = "completedRaids", default)]
    pub completed_raids: Vec<CompletedRaid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedRaid {
    pub raid: RaidRecord,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaidStatus {
    Planning,
    AwaitingApproval,
    Executing,
    Merging,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaidRecord {
    pub id: String,
    pub goal: String,
    pub status: RaidStatus,
    #[serde(rename = "planApproved")]
    pub plan_approved: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RaidRecord {
    pub fn new(id: impl Into<String>, goal: impl Into<String>, now: DateTime<Utc>) -> Self {
        RaidRecord {
            id: id.into(),
            goal: goal.into(),
            status: RaidStatus::Planning,
            plan_approved: false,
            created_at: now,
            completed_at: None,
        }
    }
}

/// A single planned task as produced by the (out-of-scope) planning step,
/// consumed directly by the scheduler's dependency-graph construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedTask {
    pub id: String,
    pub objective: String,
    #[serde(rename = "dependsOn", default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    /// Files this task is expected to touch, supplied by the planner or
    /// estimated from the Context Briefer's relevant-file query. Drives the
    /// scheduler's implicit file-conflict and package-overlap edges
    /// (SPEC_FULL §4.F).
    #[serde(rename = "estimatedFiles", default)]
    pub estimated_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Escalated,
    NeedsDecomposition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointPhase {
    Planning,
    Executing,
    Verifying,
    Reviewing,
    Committing,
}

/// Per-attempt record, appended to a task's history and never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    #[serde(rename = "tokenCount")]
    pub token_count: u64,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub success: bool,
    #[serde(rename = "errorCategories", default)]
    pub error_categories: Vec<String>,
    #[serde(rename = "filesModified", default)]
    pub files_modified: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub objective: String,
    pub status: TaskStatus,
    #[serde(rename = "attemptCount", default)]
    pub attempt_count: u32,
    #[serde(rename = "currentTier")]
    pub current_tier: String,
    #[serde(rename = "worktreePath", skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(rename = "checkpointPhase", skip_serializing_if = "Option::is_none")]
    pub checkpoint_phase: Option<CheckpointPhase>,
    #[serde(rename = "tokenUsageHistory", default)]
    pub token_usage_history: Vec<AttemptRecord>,
    #[serde(rename = "dependsOn", default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

impl TaskRecord {
    pub fn new(planned: &PlannedTask, initial_tier: impl Into<String>) -> Self {
        TaskRecord {
            id: planned.id.clone(),
            objective: planned.objective.clone(),
            status: TaskStatus::Pending,
            attempt_count: 0,
            current_tier: initial_tier.into(),
            worktree_path: None,
            checkpoint_phase: None,
            token_usage_history: Vec::new(),
            depends_on: planned.depends_on.clone(),
            conflicts: planned.conflicts.clone(),
            priority: planned.priority,
        }
    }
}

/// `tasks/<taskId>/assignment.json` — written once at launch, never mutated
/// afterward (SPEC_FULL §3 "Task-assignment record"). Status lives in the
/// checkpoint and in the in-memory task list, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskAssignment {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub objective: String,
    #[serde(rename = "assignedAt")]
    pub assigned_at: DateTime<Utc>,
    #[serde(rename = "initialModel")]
    pub initial_model: String,
    #[serde(rename = "worktreePath")]
    pub worktree_path: String,
}
