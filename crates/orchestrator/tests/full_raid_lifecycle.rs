//! End-to-end slice: Orchestrator -> Scheduler -> Worker -> commit -> extract,
//! against a real git repository (SPEC_FULL §8 Scenario 1).
//!
//! Unlike the per-module unit tests living alongside `worker_impl.rs` and
//! `scheduler_impl.rs`, this wires the real `Orchestrator`, `Scheduler` and
//! `Worker` together end to end, the same way
//! `crates/swarm-agents/tests/orchestration_smoke_test.rs` drives the
//! teacher's orchestrator against a real temp git repo rather than stubbing
//! the pieces out individually.

use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::tempdir;

use undercity_kernel::{
    AstIndex, CapabilityLedger, CheckConfig, CheckKind, ErrorFixPatternStore, EventLog,
    PlannedTask, TaskStatus, Verifier, VerifierConfig,
};
use undercity_orchestrator::agent::{AgentEvent, AgentSession, TokenUsage};
use undercity_orchestrator::context_briefer::Briefing;
use undercity_orchestrator::raid::{Orchestrator, OrchestratorError, PlanGenerator};
use undercity_orchestrator::scheduler::{
    AgentFactoryProvider, Scheduler, SchedulerConfig, WorktreeProvider,
};
use undercity_orchestrator::worker::{AgentFactory, WorkerOutcome};

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git").args(args).current_dir(dir).status().expect("spawn git");
    assert!(status.success(), "git {args:?} failed in {dir:?}");
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "raid@undercity.test"]);
    git(dir, &["config", "user.name", "Undercity Test"]);
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("src/util.ts"), "export function util() { retrn 1; }\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "init"]);
}

/// Replays a fixed event list, performing a real file write on the first
/// poll so the Worker's subsequent `git add`/`git commit` has something
/// real to stage — the same role a live coding agent's tool execution
/// would play against the opaque `AgentSession` boundary.
struct WritingSession {
    write_once: Option<Box<dyn FnOnce() + Send>>,
    events: std::vec::IntoIter<AgentEvent>,
}

#[async_trait]
impl AgentSession for WritingSession {
    async fn next_event(&mut self) -> Option<AgentEvent> {
        if let Some(write) = self.write_once.take() {
            write();
        }
        self.events.next()
    }

    async fn respond_to_stop(&mut self, _continue_: bool, _reason: Option<String>) {}
}

struct FixingFactory {
    repo: std::path::PathBuf,
}

#[async_trait]
impl AgentFactory for FixingFactory {
    async fn spawn(&mut self, _tier: undercity_kernel::Tier, _role: &str, _briefing: &Briefing) -> Box<dyn AgentSession> {
        let path = self.repo.join("src/util.ts");
        let write = Box::new(move || {
            std::fs::write(&path, "export function util() { return 1; }\n").unwrap();
        });
        let events = vec![
            AgentEvent::ToolUse {
                id: "tu1".to_string(),
                name: "Edit".to_string(),
                input: serde_json::json!({"file_path": "src/util.ts"}),
            },
            AgentEvent::ToolResult {
                tool_use_id: "tu1".to_string(),
                is_error: false,
                content: "fixed the typo".to_string(),
            },
            AgentEvent::Result { usage: TokenUsage { input_tokens: 200, output_tokens: 80, ..Default::default() } },
        ];
        Box::new(WritingSession { write_once: Some(write), events: events.into_iter() })
    }
}

struct SingleRepoFactories {
    repo: std::path::PathBuf,
}

impl AgentFactoryProvider for SingleRepoFactories {
    fn factory_for(&self, _task_id: &str) -> Box<dyn AgentFactory> {
        Box::new(FixingFactory { repo: self.repo.clone() })
    }
}

/// The worktree *is* the trunk repository: isolating checkouts per task is
/// git plumbing specified only at contract level (SPEC_FULL §1), so reusing
/// one real repo for both keeps this test hermetic while still exercising a
/// real `git add`/`git commit` through the Worker.
struct SameDirWorktrees {
    repo: std::path::PathBuf,
}

#[async_trait]
impl WorktreeProvider for SameDirWorktrees {
    async fn create(&self, _task_id: &str) -> Result<std::path::PathBuf, undercity_orchestrator::scheduler::SchedulerError> {
        Ok(self.repo.clone())
    }
    async fn destroy(&self, _task_id: &str, _path: &Path) -> Result<(), undercity_orchestrator::scheduler::SchedulerError> {
        Ok(())
    }
}

struct SingleTaskPlan(PlannedTask);

#[async_trait]
impl PlanGenerator for SingleTaskPlan {
    async fn generate_plan(&self, _goal: &str) -> Result<Vec<PlannedTask>, OrchestratorError> {
        Ok(vec![self.0.clone()])
    }
}

fn always_passing_verifier() -> Verifier {
    Verifier::new(VerifierConfig {
        checks: vec![CheckConfig::new(CheckKind::Typecheck, "true", vec![]).skipped()],
        feedback_tail_bytes: 2048,
    })
}

#[tokio::test]
async fn raid_start_to_extract_produces_one_commit() {
    let repo_dir = tempdir().unwrap();
    init_repo(repo_dir.path());
    let state_dir = tempdir().unwrap();

    let orchestrator = Orchestrator::new(state_dir.path());
    let objective = "Fix the typo in src/util.ts";
    let task = PlannedTask {
        id: "t1".to_string(),
        objective: objective.to_string(),
        depends_on: Vec::new(),
        conflicts: Vec::new(),
        priority: 0,
        estimated_files: vec!["src/util.ts".to_string()],
    };
    let plan = SingleTaskPlan(task);

    let raid = orchestrator.start("fix the util helper", &plan).await.unwrap();
    assert_eq!(raid.status, undercity_kernel::RaidStatus::AwaitingApproval);

    let waypoints = orchestrator.approve_plan().unwrap();
    assert_eq!(waypoints.len(), 1);

    let scheduler = Scheduler::new(
        SchedulerConfig::default(),
        state_dir.path(),
        std::sync::Arc::new(AstIndex::open(state_dir.path())),
        std::sync::Arc::new(always_passing_verifier()),
        std::sync::Arc::new(tokio::sync::Mutex::new(CapabilityLedger::open(state_dir.path()))),
        std::sync::Arc::new(tokio::sync::Mutex::new(ErrorFixPatternStore::open(state_dir.path()))),
        std::sync::Arc::new(EventLog::new(state_dir.path().join("grind-events.jsonl"))),
    );

    let factories = SingleRepoFactories { repo: repo_dir.path().to_path_buf() };
    let worktrees: std::sync::Arc<dyn WorktreeProvider> =
        std::sync::Arc::new(SameDirWorktrees { repo: repo_dir.path().to_path_buf() });

    let completions = AtomicUsize::new(0);
    let results = scheduler
        .run(waypoints, &factories, worktrees, |_outcome| {
            completions.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 1);
    let commit_sha = match &results[0].outcome {
        WorkerOutcome::Complete { commit_sha, attempts, .. } => {
            assert_eq!(*attempts, 1);
            commit_sha.clone().expect("worker committed a real change")
        }
        other => panic!("expected Complete, got {other:?}"),
    };

    orchestrator.record_task_update("t1", TaskStatus::Complete, None).unwrap();
    let completed = orchestrator.extract().unwrap();
    assert_eq!(completed.raid.status, undercity_kernel::RaidStatus::Complete);
    assert_eq!(completed.tasks.len(), 1);
    assert_eq!(completed.tasks[0].status, TaskStatus::Complete);
    assert!(orchestrator.status().raid.is_none());

    // The commit the Worker produced really landed in the repo's history.
    let log = Command::new("git")
        .args(["log", "-1", "--format=%H %s"])
        .current_dir(repo_dir.path())
        .output()
        .unwrap();
    let log = String::from_utf8_lossy(&log.stdout);
    assert!(log.starts_with(&commit_sha), "HEAD should be the commit the worker reported");
    assert!(
        log.trim_end().ends_with("fix: Fix the typo in src/util.ts"),
        "unexpected subject line: {log}"
    );

    let contents = std::fs::read_to_string(repo_dir.path().join("src/util.ts")).unwrap();
    assert_eq!(contents, "export function util() { return 1; }\n");
}
