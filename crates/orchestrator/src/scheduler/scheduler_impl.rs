//! The Scheduler: dependency-aware concurrent dispatch of planned tasks onto
//! Workers (SPEC_FULL §4.F).
//!
//! Grounded on the teacher corpus's `modes/deepthink.rs`
//! (`DeepthinkRunner::execute_strategies`): a `Semaphore`-bounded
//! `tokio::task::JoinSet` fan-out that tolerates individual task failure and
//! drains results as they land, adapted here from a fixed strategy count to
//! an open-ended, dependency-ordered task pool that refills as capacity
//! frees up.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::{Id as TaskId, JoinSet};
use tracing::{info, warn};

use undercity_kernel::{
    assignment_path, atomic_write_json, AstIndex, CapabilityLedger, ErrorFixPatternStore,
    EventLog, PlannedTask, TaskAssignment, Tier, Verifier,
};

use crate::worker::{AgentFactory, Worker, WorkerConfig, WorkerOutcome};

use super::graph::{dependencies_satisfied, select_parallel_set, warns_package_overlap};
use super::worktree::WorktreeProvider;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to provision worktree for task {task_id}: {source}")]
    Worktree {
        task_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("state persistence error: {0}")]
    State(#[from] undercity_kernel::StateError),
}

/// Builds a fresh, independently-owned [`AgentFactory`] for a given task, so
/// concurrently running Workers never share one factory's `&mut self`.
pub trait AgentFactoryProvider: Send + Sync {
    fn factory_for(&self, task_id: &str) -> Box<dyn AgentFactory>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Hard ceiling on simultaneously running tasks, independent of tier.
    pub max_concurrency: usize,
    /// Per-tier ceiling, checked in addition to `max_concurrency` (costlier
    /// tiers get a tighter cap so a human-tier escalation storm can't starve
    /// worker-tier throughput).
    pub per_tier_concurrency: HashMap<Tier, usize>,
    pub worker: WorkerConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut per_tier_concurrency = HashMap::new();
        per_tier_concurrency.insert(Tier::Worker, 4);
        per_tier_concurrency.insert(Tier::Council, 2);
        per_tier_concurrency.insert(Tier::Human, 1);
        SchedulerConfig { max_concurrency: 4, per_tier_concurrency, worker: WorkerConfig::default() }
    }
}

/// A task result as it lands, for streaming callbacks (SPEC_FULL §4.F
/// "Output: task results, streamed as tasks finish").
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub outcome: WorkerOutcome,
    /// The worktree the task ran in, so a caller can hand completed tasks to
    /// the merge queue without re-deriving the path.
    pub worktree: Option<PathBuf>,
}

pub struct Scheduler {
    config: SchedulerConfig,
    state_dir: PathBuf,
    ast_index: Arc<AstIndex>,
    verifier: Arc<Verifier>,
    ledger: Arc<AsyncMutex<CapabilityLedger>>,
    fix_store: Arc<AsyncMutex<ErrorFixPatternStore>>,
    event_log: Arc<EventLog>,
}

/// Bookkeeping for one in-flight task: kept alongside the `PlannedTask` so
/// completion can decrement the right tier's counter without re-deriving it.
struct InFlight {
    #[allow(dead_code)]
    task: PlannedTask,
    tier: Tier,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        state_dir: impl Into<PathBuf>,
        ast_index: Arc<AstIndex>,
        verifier: Arc<Verifier>,
        ledger: Arc<AsyncMutex<CapabilityLedger>>,
        fix_store: Arc<AsyncMutex<ErrorFixPatternStore>>,
        event_log: Arc<EventLog>,
    ) -> Self {
        Scheduler { config, state_dir: state_dir.into(), ast_index, verifier, ledger, fix_store, event_log }
    }

    /// Runs `tasks` to completion, launching as many as capacity and the
    /// dependency graph allow at any moment, and invoking `on_result` as
    /// each one finishes. Returns once every task has either completed,
    /// failed, or been judged permanently unschedulable (an unsatisfiable
    /// `dependsOn`, including cycles).
    pub async fn run(
        &self,
        tasks: Vec<PlannedTask>,
        factories: &dyn AgentFactoryProvider,
        worktrees: Arc<dyn WorktreeProvider>,
        mut on_result: impl FnMut(TaskOutcome) + Send,
    ) -> Vec<TaskOutcome> {
        self.log_package_overlap_warnings(&tasks);

        let mut pending: HashMap<String, PlannedTask> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        let mut in_flight: HashMap<String, InFlight> = HashMap::new();
        let mut tier_in_flight: HashMap<Tier, usize> = HashMap::new();
        let mut completed: HashSet<String> = HashSet::new();
        let mut results: Vec<TaskOutcome> = Vec::new();

        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
        let mut id_to_task: HashMap<TaskId, String> = HashMap::new();

        loop {
            self.fill_capacity(
                &mut pending,
                &mut in_flight,
                &mut tier_in_flight,
                &completed,
                &mut join_set,
                &mut id_to_task,
                factories,
                &worktrees,
            )
            .await;

            if in_flight.is_empty() {
                break;
            }

            match join_set.join_next_with_id().await {
                Some(Ok((joined_id, outcome))) => {
                    id_to_task.remove(&joined_id);
                    if let Some(slot) = in_flight.remove(&outcome.task_id) {
                        decrement_tier(&mut tier_in_flight, slot.tier);
                    }
                    completed.insert(outcome.task_id.clone());
                    on_result(outcome.clone());
                    results.push(outcome);
                }
                Some(Err(join_err)) => {
                    let task_id = id_to_task.remove(&join_err.id());
                    warn!(?join_err, ?task_id, "scheduler: worker task panicked");
                    if let Some(task_id) = task_id {
                        if let Some(slot) = in_flight.remove(&task_id) {
                            decrement_tier(&mut tier_in_flight, slot.tier);
                        }
                        let outcome = TaskOutcome {
                            task_id: task_id.clone(),
                            outcome: WorkerOutcome::Failed {
                                reason: "worker task panicked".to_string(),
                                attempts: 0,
                            },
                            worktree: None,
                        };
                        on_result(outcome.clone());
                        results.push(outcome);
                    }
                }
                None => break,
            }
        }

        for (task_id, _) in pending {
            let outcome = TaskOutcome {
                task_id: task_id.clone(),
                outcome: WorkerOutcome::Failed {
                    reason: "unschedulable: unsatisfiable or cyclic dependsOn".to_string(),
                    attempts: 0,
                },
                worktree: None,
            };
            on_result(outcome.clone());
            results.push(outcome);
        }

        results
    }

    fn log_package_overlap_warnings(&self, tasks: &[PlannedTask]) {
        for (i, a) in tasks.iter().enumerate() {
            for b in &tasks[i + 1..] {
                if warns_package_overlap(a, b) {
                    warn!(task_a = %a.id, task_b = %b.id, "scheduler: tasks share package scope but no hard conflict");
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn fill_capacity(
        &self,
        pending: &mut HashMap<String, PlannedTask>,
        in_flight: &mut HashMap<String, InFlight>,
        tier_in_flight: &mut HashMap<Tier, usize>,
        completed: &HashSet<String>,
        join_set: &mut JoinSet<TaskOutcome>,
        id_to_task: &mut HashMap<TaskId, String>,
        factories: &dyn AgentFactoryProvider,
        worktrees: &Arc<dyn WorktreeProvider>,
    ) {
        loop {
            if in_flight.len() >= self.config.max_concurrency {
                break;
            }
            let runnable: Vec<&PlannedTask> = pending
                .values()
                .filter(|t| dependencies_satisfied(t, completed))
                .collect();
            if runnable.is_empty() {
                break;
            }
            let already_running: Vec<&PlannedTask> =
                in_flight.values().map(|slot| &slot.task).collect();
            let budget = self.config.max_concurrency - in_flight.len();
            let chosen_ids: Vec<String> = select_parallel_set(&runnable, &already_running, budget)
                .into_iter()
                .map(|t| t.id.clone())
                .collect();
            if chosen_ids.is_empty() {
                break;
            }

            let mut launched_any = false;
            for id in chosen_ids {
                let objective = pending.get(&id).expect("chosen id came from pending").objective.clone();
                let tier = { self.ledger.lock().await.recommend(&objective).tier };
                let cap = self.config.per_tier_concurrency.get(&tier).copied().unwrap_or(usize::MAX);
                let running_at_tier = tier_in_flight.get(&tier).copied().unwrap_or(0);
                if running_at_tier >= cap {
                    continue;
                }
                let task = pending.remove(&id).expect("chosen id came from pending");
                let factory = factories.factory_for(&task.id);
                let handle = self.launch(task.clone(), tier, factory, worktrees.clone(), join_set);
                id_to_task.insert(handle, task.id.clone());
                *tier_in_flight.entry(tier).or_insert(0) += 1;
                in_flight.insert(task.id.clone(), InFlight { task, tier });
                launched_any = true;
            }
            if !launched_any {
                break;
            }
        }
    }

    fn launch(
        &self,
        task: PlannedTask,
        initial_tier: Tier,
        mut factory: Box<dyn AgentFactory>,
        worktrees: Arc<dyn WorktreeProvider>,
        join_set: &mut JoinSet<TaskOutcome>,
    ) -> TaskId {
        let task_id = task.id.clone();
        let objective = task.objective.clone();
        let state_dir = self.state_dir.clone();
        let ast_index = self.ast_index.clone();
        let verifier = self.verifier.clone();
        let ledger = self.ledger.clone();
        let fix_store = self.fix_store.clone();
        let event_log = self.event_log.clone();
        let worker_config = self.config.worker.clone();

        let abort = join_set.spawn(async move {
            let worktree = match worktrees.create(&task_id).await {
                Ok(path) => path,
                Err(err) => {
                    warn!(task_id = %task_id, %err, "scheduler: worktree provisioning failed");
                    return TaskOutcome {
                        task_id,
                        outcome: WorkerOutcome::Failed {
                            reason: format!("worktree provisioning failed: {err}"),
                            attempts: 0,
                        },
                        worktree: None,
                    };
                }
            };

            let assignment = TaskAssignment {
                task_id: task_id.clone(),
                objective: objective.clone(),
                assigned_at: chrono::Utc::now(),
                initial_model: initial_tier.as_str().to_string(),
                worktree_path: worktree.to_string_lossy().to_string(),
            };
            if let Err(err) = atomic_write_json(&assignment_path(&state_dir, &task_id), &assignment) {
                warn!(task_id = %task_id, %err, "scheduler: failed to persist task assignment");
            }

            let mut ledger_guard = ledger.lock_owned().await;
            let mut fix_guard = fix_store.lock_owned().await;

            let mut worker = Worker::new(
                task_id.clone(),
                objective.clone(),
                worktree.clone(),
                state_dir.clone(),
                initial_tier,
                worker_config,
                &ast_index,
                &verifier,
                &mut ledger_guard,
                &mut fix_guard,
                &event_log,
            );

            let outcome = match worker.run(factory.as_mut()).await {
                Ok(outcome) => outcome,
                Err(err) => WorkerOutcome::Failed { reason: err.to_string(), attempts: 0 },
            };

            drop(ledger_guard);
            drop(fix_guard);

            let keep_worktree = matches!(outcome, WorkerOutcome::Complete { .. });
            if !keep_worktree {
                if let Err(err) = worktrees.destroy(&task_id, &worktree).await {
                    warn!(task_id = %task_id, %err, "scheduler: worktree cleanup failed");
                }
            }

            info!(task_id = %task_id, ?outcome, "scheduler: task finished");
            TaskOutcome {
                task_id,
                outcome,
                worktree: if keep_worktree { Some(worktree) } else { None },
            }
        });
        abort.id()
    }
}

fn decrement_tier(tier_in_flight: &mut HashMap<Tier, usize>, tier: Tier) {
    if let Some(count) = tier_in_flight.get_mut(&tier) {
        *count = count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentEvent, AgentSession, TokenUsage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use undercity_kernel::VerifierConfig;

    struct ImmediateCompleteSession;

    #[async_trait]
    impl AgentSession for ImmediateCompleteSession {
        async fn next_event(&mut self) -> Option<AgentEvent> {
            static STEP: AtomicUsize = AtomicUsize::new(0);
            match STEP.fetch_add(1, Ordering::SeqCst) {
                0 => Some(AgentEvent::AssistantText {
                    text: "TASK_ALREADY_COMPLETE: nothing left to do".to_string(),
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

    struct InPlaceWorktrees {
        root: PathBuf,
    }

    #[async_trait]
    impl WorktreeProvider for InPlaceWorktrees {
        async fn create(&self, _task_id: &str) -> Result<PathBuf, SchedulerError> {
            Ok(self.root.clone())
        }
        async fn destroy(&self, _task_id: &str, _path: &std::path::Path) -> Result<(), SchedulerError> {
            Ok(())
        }
    }

    fn noop_verifier() -> Verifier {
        Verifier::new(VerifierConfig { checks: Vec::new(), ..Default::default() })
    }

    fn task(id: &str, depends_on: &[&str]) -> PlannedTask {
        PlannedTask {
            id: id.to_string(),
            objective: "fix the thing".to_string(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            conflicts: Vec::new(),
            priority: 0,
            estimated_files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn unschedulable_task_reports_failed_without_hanging() {
        let dir = tempdir().unwrap();
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            dir.path(),
            Arc::new(AstIndex::open(dir.path())),
            Arc::new(noop_verifier()),
            Arc::new(AsyncMutex::new(CapabilityLedger::open(dir.path()))),
            Arc::new(AsyncMutex::new(ErrorFixPatternStore::open(dir.path()))),
            Arc::new(EventLog::new(dir.path().join("events.jsonl"))),
        );

        let tasks = vec![task("a", &["missing"])];
        let worktrees: Arc<dyn WorktreeProvider> = Arc::new(InPlaceWorktrees { root: dir.path().to_path_buf() });
        let mut seen = Vec::new();
        let results = scheduler
            .run(tasks, &StubFactoryProvider, worktrees, |outcome| seen.push(outcome.task_id.clone()))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(seen, vec!["a".to_string()]);
        assert!(matches!(results[0].outcome, WorkerOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn independent_tasks_all_complete() {
        let dir = tempdir().unwrap();
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            dir.path(),
            Arc::new(AstIndex::open(dir.path())),
            Arc::new(noop_verifier()),
            Arc::new(AsyncMutex::new(CapabilityLedger::open(dir.path()))),
            Arc::new(AsyncMutex::new(ErrorFixPatternStore::open(dir.path()))),
            Arc::new(EventLog::new(dir.path().join("events.jsonl"))),
        );

        let tasks = vec![task("a", &[]), task("b", &[])];
        let worktrees: Arc<dyn WorktreeProvider> = Arc::new(InPlaceWorktrees { root: dir.path().to_path_buf() });
        let results = scheduler.run(tasks, &StubFactoryProvider, worktrees, |_| {}).await;

        assert_eq!(results.len(), 2);
        let mut ids: Vec<&str> = results.iter().map(|r| r.task_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
