//! The Merge Queue ("Elevator"): strictly serial rebase → reverify →
//! fast-forward pipeline for completed worktrees (SPEC_FULL §4.G).
//!
//! Grounded on the teacher corpus's `coordination::resilience` single-permit
//! mutex pattern: the whole drain loop is gated by one `tokio::sync::Mutex`,
//! so even if callers invoke `drain` from two places at once, processing
//! never overlaps with itself.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use undercity_kernel::{AstIndex, CapabilityLedger, ErrorFixPatternStore, EventLog, Tier, Verifier};

use crate::scheduler::AgentFactoryProvider;
use crate::worker::{Worker, WorkerConfig, WorkerOutcome};

use super::backend::{MergeBackend, RebaseOutcome};

#[derive(Debug, Error)]
pub enum MergeQueueError {
    #[error("rebase failed for {worktree}: {source}")]
    Rebase {
        worktree: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("fast-forward failed for {worktree}: {source}")]
    FastForward {
        worktree: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("worktree cleanup failed for {worktree}: {source}")]
    Cleanup {
        worktree: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A completed task waiting to be folded onto trunk.
#[derive(Debug, Clone)]
pub struct MergeItem {
    pub task_id: String,
    pub objective: String,
    pub tier: Tier,
    pub worktree: PathBuf,
    /// Set once this item has already gone through the one-repair-pass
    /// retry; a second failure surrenders instead of retrying again.
    repair_attempted: bool,
}

impl MergeItem {
    pub fn new(task_id: impl Into<String>, objective: impl Into<String>, tier: Tier, worktree: impl Into<PathBuf>) -> Self {
        MergeItem {
            task_id: task_id.into(),
            objective: objective.into(),
            tier,
            worktree: worktree.into(),
            repair_attempted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MergeResult {
    Merged { task_id: String, commit_sha: String },
    Failed { task_id: String, reason: String },
}

pub struct MergeQueue {
    items: AsyncMutex<VecDeque<MergeItem>>,
    processing: AsyncMutex<()>,
    backend: Arc<dyn MergeBackend>,
    verifier: Arc<Verifier>,
    ast_index: Arc<AstIndex>,
    ledger: Arc<AsyncMutex<CapabilityLedger>>,
    fix_store: Arc<AsyncMutex<ErrorFixPatternStore>>,
    event_log: Arc<EventLog>,
    state_dir: PathBuf,
    worker_config: WorkerConfig,
}

impl MergeQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn MergeBackend>,
        verifier: Arc<Verifier>,
        ast_index: Arc<AstIndex>,
        ledger: Arc<AsyncMutex<CapabilityLedger>>,
        fix_store: Arc<AsyncMutex<ErrorFixPatternStore>>,
        event_log: Arc<EventLog>,
        state_dir: impl Into<PathBuf>,
        worker_config: WorkerConfig,
    ) -> Self {
        MergeQueue {
            items: AsyncMutex::new(VecDeque::new()),
            processing: AsyncMutex::new(()),
            backend,
            verifier,
            ast_index,
            ledger,
            fix_store,
            event_log,
            state_dir: state_dir.into(),
            worker_config,
        }
    }

    pub async fn enqueue(&self, item: MergeItem) {
        self.items.lock().await.push_back(item);
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Pops the highest-priority (earliest-enqueued, among equal priority)
    /// item. The queue itself carries no explicit priority field today
    /// (items arrive in completion order from the Scheduler), so this is
    /// presently equivalent to plain FIFO; kept as its own step so a future
    /// priority field on `MergeItem` only changes this one line.
    async fn pop_next(&self) -> Option<MergeItem> {
        self.items.lock().await.pop_front()
    }

    /// Drains the queue, processing one item at a time to completion. Holds
    /// `processing` for the whole drain so concurrent callers never overlap
    /// (SPEC_FULL §4.G invariant: "the Merge Queue never runs in parallel
    /// with itself").
    pub async fn drain(&self, factories: &dyn AgentFactoryProvider) -> Vec<MergeResult> {
        let _guard = self.processing.lock().await;
        let mut results = Vec::new();
        while let Some(item) = self.pop_next().await {
            if let Some(result) = self.process_one(item, factories).await {
                results.push(result);
            }
        }
        results
    }

    /// `None` means the item was re-enqueued after a successful repair pass
    /// and will be picked up again later in this same drain; it is not yet
    /// a terminal result.
    async fn process_one(&self, item: MergeItem, factories: &dyn AgentFactoryProvider) -> Option<MergeResult> {
        match self.backend.rebase_onto_trunk(&item.worktree).await {
            Ok(RebaseOutcome::Clean) => self.reverify_and_land(item, factories).await,
            Ok(RebaseOutcome::Conflict) => self.repair_or_surrender(item, factories, "rebase conflict".to_string()).await,
            Err(err) => self.repair_or_surrender(item, factories, err.to_string()).await,
        }
    }

    async fn reverify_and_land(&self, item: MergeItem, factories: &dyn AgentFactoryProvider) -> Option<MergeResult> {
        let verification = self.verifier.run(&item.worktree, None).await;
        match verification {
            Ok(result) if result.passed => match self.backend.fast_forward_trunk(&item.worktree).await {
                Ok(sha) => {
                    if let Err(err) = self.backend.destroy_worktree(&item.worktree).await {
                        warn!(task_id = %item.task_id, %err, "merge queue: worktree cleanup failed after merge");
                    }
                    info!(task_id = %item.task_id, commit_sha = %sha, "merge queue: merged onto trunk");
                    Some(MergeResult::Merged { task_id: item.task_id, commit_sha: sha })
                }
                Err(err) => self.repair_or_surrender(item, factories, err.to_string()).await,
            },
            Ok(_) => self.repair_or_surrender(item, factories, "reverification failed after rebase".to_string()).await,
            Err(err) => self.repair_or_surrender(item, factories, err.to_string()).await,
        }
    }

    async fn repair_or_surrender(
        &self,
        mut item: MergeItem,
        factories: &dyn AgentFactoryProvider,
        reason: String,
    ) -> Option<MergeResult> {
        if item.repair_attempted {
            if let Err(err) = self.backend.destroy_worktree(&item.worktree).await {
                warn!(task_id = %item.task_id, %err, "merge queue: worktree cleanup failed after surrender");
            }
            warn!(task_id = %item.task_id, %reason, "merge queue: surrendering after repeat failure");
            return Some(MergeResult::Failed { task_id: item.task_id, reason });
        }

        item.repair_attempted = true;
        let repair_objective = format!(
            "Resolve the merge failure found while landing this task onto trunk ({reason}). Original objective: {original}",
            original = item.objective
        );

        let mut factory = factories.factory_for(&item.task_id);
        let mut ledger_guard = self.ledger.lock().await;
        let mut fix_guard = self.fix_store.lock().await;

        let mut worker = Worker::new(
            item.task_id.clone(),
            repair_objective,
            item.worktree.clone(),
            self.state_dir.clone(),
            item.tier,
            self.worker_config.clone(),
            &self.ast_index,
            &self.verifier,
            &mut ledger_guard,
            &mut fix_guard,
            &self.event_log,
        );

        let repair_outcome = worker.run(factory.as_mut()).await;
        drop(ledger_guard);
        drop(fix_guard);

        match repair_outcome {
            Ok(WorkerOutcome::Complete { .. }) => {
                info!(task_id = %item.task_id, "merge queue: repair pass succeeded, re-enqueuing");
                self.enqueue(item).await;
                None
            }
            Ok(outcome) => {
                if let Err(err) = self.backend.destroy_worktree(&item.worktree).await {
                    warn!(task_id = %item.task_id, %err, "merge queue: worktree cleanup failed after failed repair");
                }
                let reason = match outcome {
                    WorkerOutcome::Failed { reason, .. } => reason,
                    WorkerOutcome::NeedsDecomposition { .. } => {
                        "repair pass needs decomposition".to_string()
                    }
                    WorkerOutcome::Complete { .. } => unreachable!(),
                };
                Some(MergeResult::Failed { task_id: item.task_id, reason })
            }
            Err(err) => {
                if let Err(cleanup_err) = self.backend.destroy_worktree(&item.worktree).await {
                    warn!(task_id = %item.task_id, err = %cleanup_err, "merge queue: worktree cleanup failed after repair error");
                }
                Some(MergeResult::Failed { task_id: item.task_id, reason: err.to_string() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentEvent, AgentSession, TokenUsage};
    use crate::worker::AgentFactory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;
    use undercity_kernel::{CheckConfig, CheckKind, VerifierConfig};

    struct AlwaysRebaseClean {
        fast_forward_calls: AtomicUsize,
        rebase_calls: AtomicUsize,
        rebase_result: RebaseOutcome,
    }

    #[async_trait]
    impl MergeBackend for AlwaysRebaseClean {
        async fn rebase_onto_trunk(&self, _worktree: &std::path::Path) -> Result<RebaseOutcome, MergeQueueError> {
            self.rebase_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rebase_result.clone())
        }
        async fn fast_forward_trunk(&self, _worktree: &std::path::Path) -> Result<String, MergeQueueError> {
            self.fast_forward_calls.fetch_add(1, Ordering::SeqCst);
            Ok("deadbeef".to_string())
        }
        async fn destroy_worktree(&self, _worktree: &std::path::Path) -> Result<(), MergeQueueError> {
            Ok(())
        }
    }

    struct ImmediateCompleteSession;

    #[async_trait]
    impl AgentSession for ImmediateCompleteSession {
        async fn next_event(&mut self) -> Option<AgentEvent> {
            static STEP: AtomicUsize = AtomicUsize::new(0);
            match STEP.fetch_add(1, Ordering::SeqCst) {
                0 => Some(AgentEvent::AssistantText {
                    text: "TASK_ALREADY_COMPLETE: repaired".to_string(),
                }),
                1 => Some(AgentEvent::Result { usage: TokenUsage::default() }),
                _ => None,
            }
        }
        async fn respond_to_stop(&mut self, _continue_: bool, _reason: Option<String>) {}
    }

    struct StubFactory;

    #[async_trait]
    impl AgentFactory for StubFactory {
        async fn spawn(&mut self, _tier: Tier, _role: &str, _briefing: &crate::context_briefer::Briefing) -> Box<dyn AgentSession> {
            Box::new(ImmediateCompleteSession)
        }
    }

    struct StubFactoryProvider;

    impl AgentFactoryProvider for StubFactoryProvider {
        fn factory_for(&self, _task_id: &str) -> Box<dyn AgentFactory> {
            Box::new(StubFactory)
        }
    }

    fn noop_verifier() -> Verifier {
        Verifier::new(VerifierConfig {
            checks: vec![CheckConfig::new(CheckKind::Typecheck, "true", vec![]).skipped()],
            feedback_tail_bytes: 2048,
        })
    }

    fn build_queue(dir: &std::path::Path, backend: Arc<dyn MergeBackend>) -> MergeQueue {
        MergeQueue::new(
            backend,
            Arc::new(noop_verifier()),
            Arc::new(AstIndex::open(dir)),
            Arc::new(AsyncMutex::new(CapabilityLedger::open(dir))),
            Arc::new(AsyncMutex::new(ErrorFixPatternStore::open(dir))),
            Arc::new(EventLog::new(dir.join("events.jsonl"))),
            dir,
            WorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn clean_rebase_and_pass_merges_and_drains() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(AlwaysRebaseClean {
            fast_forward_calls: AtomicUsize::new(0),
            rebase_calls: AtomicUsize::new(0),
            rebase_result: RebaseOutcome::Clean,
        });
        let queue = build_queue(dir.path(), backend.clone());
        queue.enqueue(MergeItem::new("task-a", "fix the thing", Tier::Worker, dir.path())).await;

        let results = queue.drain(&StubFactoryProvider).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0], MergeResult::Merged { task_id, .. } if task_id == "task-a"));
        assert_eq!(backend.fast_forward_calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn conflict_triggers_one_repair_then_merges() {
        let dir = tempdir().unwrap();
        // Rebase reports a conflict on the first attempt and clean after the
        // item is re-enqueued post-repair.
        struct FlakyBackend {
            calls: StdMutex<usize>,
        }
        #[async_trait]
        impl MergeBackend for FlakyBackend {
            async fn rebase_onto_trunk(&self, _worktree: &std::path::Path) -> Result<RebaseOutcome, MergeQueueError> {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Ok(RebaseOutcome::Conflict)
                } else {
                    Ok(RebaseOutcome::Clean)
                }
            }
            async fn fast_forward_trunk(&self, _worktree: &std::path::Path) -> Result<String, MergeQueueError> {
                Ok("cafef00d".to_string())
            }
            async fn destroy_worktree(&self, _worktree: &std::path::Path) -> Result<(), MergeQueueError> {
                Ok(())
            }
        }

        let backend = Arc::new(FlakyBackend { calls: StdMutex::new(0) });
        let queue = build_queue(dir.path(), backend);
        queue.enqueue(MergeItem::new("task-b", "fix the other thing", Tier::Worker, dir.path())).await;

        let results = queue.drain(&StubFactoryProvider).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0], MergeResult::Merged { task_id, .. } if task_id == "task-b"));
    }
}
