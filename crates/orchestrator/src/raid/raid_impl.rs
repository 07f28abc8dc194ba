//! The Raid / Orchestrator facade: `start`, `approvePlan`, `extract`,
//! `surrender`, `status` (SPEC_FULL §4.H).
//!
//! Grounded on the teacher corpus's `harness::session::SessionManager`
//! (explicit lifecycle guards returning a typed `InvalidStateTransition`
//! error), generalized from a single-session iteration counter to the
//! pocket/inventory/stash raid lifecycle.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use undercity_kernel::{
    atomic_write_json, tolerant_load_json, CompletedRaid, Inventory, Pocket, PlannedTask,
    RaidRecord, RaidStatus, Stash, StateError, TaskRecord, TaskStatus,
};

use super::plan::PlanGenerator;

const POCKET_FILE: &str = "pocket.json";
const INVENTORY_FILE: &str = "inventory.json";
const STASH_FILE: &str = "stash.json";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no active raid")]
    NoActiveRaid,
    #[error("invalid transition: {command} requires status {expected}, found {found:?}")]
    InvalidTransition { command: &'static str, expected: &'static str, found: RaidStatus },
    #[error("active tasks remain: {0} task(s) not yet terminal")]
    ActiveTasksRemain(usize),
    #[error("plan generation failed: {0}")]
    Plan(#[source] anyhow::Error),
    #[error("state persistence error: {0}")]
    State(#[from] StateError),
}

/// A read-only snapshot for `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct RaidStatusSnapshot {
    pub raid: Option<RaidRecord>,
    pub waypoints: Vec<PlannedTask>,
    pub squad: Vec<TaskRecord>,
}

fn task_is_active(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Pending | TaskStatus::Running | TaskStatus::NeedsDecomposition | TaskStatus::Escalated)
}

/// Top-level facade over the pocket/inventory/stash persisted files
/// (SPEC_FULL §4.H, §6).
pub struct Orchestrator {
    state_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Orchestrator { state_dir: state_dir.into() }
    }

    fn pocket_path(&self) -> PathBuf {
        self.state_dir.join(POCKET_FILE)
    }
    fn inventory_path(&self) -> PathBuf {
        self.state_dir.join(INVENTORY_FILE)
    }
    fn stash_path(&self) -> PathBuf {
        self.state_dir.join(STASH_FILE)
    }

    fn load_pocket(&self) -> Pocket {
        tolerant_load_json(&self.pocket_path())
    }
    fn load_inventory(&self) -> Inventory {
        tolerant_load_json(&self.inventory_path())
    }
    fn load_stash(&self) -> Stash {
        tolerant_load_json(&self.stash_path())
    }

    /// If an active raid exists in the pocket, resume it (return it
    /// unchanged); otherwise create a new raid in `planning`, generate a
    /// plan, and transition to `awaiting_approval`.
    pub async fn start(
        &self,
        goal: &str,
        plan_generator: &dyn PlanGenerator,
    ) -> Result<RaidRecord, OrchestratorError> {
        let pocket = self.load_pocket();
        if pocket.raid_id.is_some() {
            let inventory = self.load_inventory();
            if let Some(raid) = inventory.raid {
                return Ok(raid);
            }
        }

        let now = Utc::now();
        let mut raid = RaidRecord::new(uuid::Uuid::new_v4().to_string(), goal, now);

        let waypoints = plan_generator.generate_plan(goal).await?;
        let squad: Vec<TaskRecord> =
            waypoints.iter().map(|t| TaskRecord::new(t, "worker")).collect();

        raid.status = RaidStatus::AwaitingApproval;

        let inventory = Inventory { raid: Some(raid.clone()), waypoints, squad };
        atomic_write_json(&self.inventory_path(), &inventory)?;
        let pocket = Pocket { raid_id: Some(raid.id.clone()), raid_status: Some(raid.status) };
        atomic_write_json(&self.pocket_path(), &pocket)?;

        Ok(raid)
    }

    /// Valid only in `awaiting_approval`; transitions to `executing` and
    /// returns the waypoints for the caller to hand to the Scheduler.
    pub fn approve_plan(&self) -> Result<Vec<PlannedTask>, OrchestratorError> {
        let mut inventory = self.load_inventory();
        let mut raid = inventory.raid.take().ok_or(OrchestratorError::NoActiveRaid)?;

        if raid.status != RaidStatus::AwaitingApproval {
            return Err(OrchestratorError::InvalidTransition {
                command: "approvePlan",
                expected: "awaiting_approval",
                found: raid.status,
            });
        }

        raid.plan_approved = true;
        raid.status = RaidStatus::Executing;
        let waypoints = inventory.waypoints.clone();

        inventory.raid = Some(raid.clone());
        atomic_write_json(&self.inventory_path(), &inventory)?;
        let pocket = Pocket { raid_id: Some(raid.id.clone()), raid_status: Some(raid.status) };
        atomic_write_json(&self.pocket_path(), &pocket)?;

        Ok(waypoints)
    }

    /// Valid only when no active tasks remain; marks the raid complete,
    /// appends it to `stash.json`, and clears the pocket.
    pub fn extract(&self) -> Result<CompletedRaid, OrchestratorError> {
        let mut inventory = self.load_inventory();
        let mut raid = inventory.raid.take().ok_or(OrchestratorError::NoActiveRaid)?;

        let active = inventory.squad.iter().filter(|t| task_is_active(t.status)).count();
        if active > 0 {
            return Err(OrchestratorError::ActiveTasksRemain(active));
        }

        raid.status = RaidStatus::Complete;
        raid.completed_at = Some(Utc::now());
        let completed = CompletedRaid { raid, tasks: inventory.squad.clone() };

        let mut stash = self.load_stash();
        stash.completed_raids.push(completed.clone());
        atomic_write_json(&self.stash_path(), &stash)?;
        atomic_write_json(&self.pocket_path(), &Pocket::default())?;

        Ok(completed)
    }

    /// Aborts active work at the facade level (the Scheduler/Worker layer
    /// is responsible for actually cancelling in-flight tasks): marks the
    /// raid failed, appends to stash, clears the pocket. Never touches
    /// already-committed history.
    pub fn surrender(&self) -> Result<CompletedRaid, OrchestratorError> {
        let mut inventory = self.load_inventory();
        let mut raid = inventory.raid.take().ok_or(OrchestratorError::NoActiveRaid)?;

        raid.status = RaidStatus::Failed;
        raid.completed_at = Some(Utc::now());
        let completed = CompletedRaid { raid, tasks: inventory.squad.clone() };

        let mut stash = self.load_stash();
        stash.completed_raids.push(completed.clone());
        atomic_write_json(&self.stash_path(), &stash)?;
        atomic_write_json(&self.pocket_path(), &Pocket::default())?;

        Ok(completed)
    }

    /// Read-only snapshot of the active raid, if any. Driven by the pocket
    /// pointer rather than `inventory.json` directly, since `extract`/
    /// `surrender` clear the pocket but leave the last raid's aggregate on
    /// disk for history/debugging.
    pub fn status(&self) -> RaidStatusSnapshot {
        let pocket = self.load_pocket();
        if pocket.raid_id.is_none() {
            return RaidStatusSnapshot { raid: None, waypoints: Vec::new(), squad: Vec::new() };
        }
        let inventory = self.load_inventory();
        RaidStatusSnapshot { raid: inventory.raid, waypoints: inventory.waypoints, squad: inventory.squad }
    }

    /// Updates the in-memory squad's task record after the Scheduler
    /// reports a result, and persists the change. Kept deliberately thin:
    /// the Orchestrator only tracks status/tier/worktree bookkeeping here,
    /// not the full attempt history (that lives in each task's checkpoint).
    pub fn record_task_update(
        &self,
        task_id: &str,
        status: TaskStatus,
        worktree_path: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let mut inventory = self.load_inventory();
        if let Some(record) = inventory.squad.iter_mut().find(|t| t.id == task_id) {
            record.status = status;
            if worktree_path.is_some() {
                record.worktree_path = worktree_path;
            }
        }
        atomic_write_json(&self.inventory_path(), &inventory)?;
        Ok(())
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;
    use undercity_kernel::PlannedTask;

    struct FixedPlan(Vec<PlannedTask>);

    #[async_trait]
    impl PlanGenerator for FixedPlan {
        async fn generate_plan(&self, _goal: &str) -> Result<Vec<PlannedTask>, OrchestratorError> {
            Ok(self.0.clone())
        }
    }

    fn task(id: &str) -> PlannedTask {
        PlannedTask {
            id: id.to_string(),
            objective: format!("do {id}"),
            depends_on: Vec::new(),
            conflicts: Vec::new(),
            priority: 0,
            estimated_files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn start_then_approve_then_extract_happy_path() {
        let dir = tempdir().unwrap();
        let orchestrator = Orchestrator::new(dir.path());
        let plan = FixedPlan(vec![task("t1")]);

        let raid = orchestrator.start("ship the feature", &plan).await.unwrap();
        assert_eq!(raid.status, RaidStatus::AwaitingApproval);

        let waypoints = orchestrator.approve_plan().unwrap();
        assert_eq!(waypoints.len(), 1);

        let err = orchestrator.extract().unwrap_err();
        assert!(matches!(err, OrchestratorError::ActiveTasksRemain(1)));

        orchestrator.record_task_update("t1", TaskStatus::Complete, None).unwrap();
        let completed = orchestrator.extract().unwrap();
        assert_eq!(completed.raid.status, RaidStatus::Complete);

        let status = orchestrator.status();
        assert!(status.raid.is_none());
    }

    #[tokio::test]
    async fn approve_plan_without_active_raid_fails() {
        let dir = tempdir().unwrap();
        let orchestrator = Orchestrator::new(dir.path());
        let err = orchestrator.approve_plan().unwrap_err();
        assert!(matches!(err, OrchestratorError::NoActiveRaid));
    }

    #[tokio::test]
    async fn surrender_marks_failed_and_clears_pocket() {
        let dir = tempdir().unwrap();
        let orchestrator = Orchestrator::new(dir.path());
        let plan = FixedPlan(vec![task("t1")]);
        orchestrator.start("ship it", &plan).await.unwrap();
        orchestrator.approve_plan().unwrap();

        let completed = orchestrator.surrender().unwrap();
        assert_eq!(completed.raid.status, RaidStatus::Failed);
        assert!(orchestrator.status().raid.is_none());
    }
}
