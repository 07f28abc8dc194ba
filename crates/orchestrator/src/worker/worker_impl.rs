//! The Worker: drives one task through repeated agent attempts, verification,
//! optional review, and commit (SPEC_FULL §4.E).
//!
//! Grounded on the teacher corpus's `crates/swarm-agents/src/orchestrator.rs`
//! (attempt loop shape, the `git_commit_changes` staging idiom, per-iteration
//! token/duration accounting) and `coordination/src/escalation/engine.rs`
//! (wiring an escalation decision into the retry loop), generalized from the
//! teacher's fixed compile-verify-validate-merge pipeline to this domain's
//! planning/executing/verifying/reviewing/committing cycle and its
//! agent-marker/stop-gate contract (SPEC_FULL §6).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use undercity_kernel::{
    atomic_write_json, checkpoint_path, AstIndex, AttemptRecord, CapabilityLedger,
    CheckpointPhase, CompletionUpdate, ErrorFixPatternStore, EventLog, GrindEvent, Tier,
    VerificationResult, Verifier,
};

use crate::agent::{is_noop_result, AgentEvent, AgentSession, TokenUsage, WRITE_TOOLS};
use crate::commit_message::build_subject;
use crate::context_briefer::{Briefing, ContextBriefer};

use super::escalation::{
    decide_escalation, error_prefix, EscalationBudgets, EscalationDecision, EscalationInputs,
};
use super::markers::{first_marker, AgentMarker};
use super::state::{WorkerState, WorkerStateMachine};

/// Tunables for one Worker run (SPEC_FULL §4.E "Configuration").
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub budgets: EscalationBudgets,
    pub max_writes_per_file: u32,
    pub max_review_passes_per_tier: u32,
    pub max_review_passes_at_top_tier: u32,
    pub auto_commit: bool,
    pub context_max_results: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            budgets: EscalationBudgets::default(),
            max_writes_per_file: 10,
            max_review_passes_per_tier: 2,
            max_review_passes_at_top_tier: 1,
            auto_commit: true,
            context_max_results: 8,
        }
    }
}

/// Spawns one agent invocation for a tier and role. Implementations back
/// this with whatever concrete agent SDK binding a deployment uses; the
/// Worker only ever sees the [`AgentSession`] trait.
#[async_trait::async_trait]
pub trait AgentFactory: Send {
    async fn spawn(&mut self, tier: Tier, role: &str, briefing: &Briefing) -> Box<dyn AgentSession>;
}

/// Telemetry from a single streamed agent invocation (SPEC_FULL §4.E steps
/// 2-3). Returned from each attempt and review pass for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct AttemptOutcome {
    pub marker: Option<AgentMarker>,
    pub usage: TokenUsage,
    pub writes: u32,
    pub no_ops: u32,
    pub stop_rejections: u32,
    /// Set when the stop gate fails the task fast (`VAGUE_TASK`): three
    /// consecutive stop requests with no writes and no no-ops.
    pub forced_fail: Option<String>,
}

/// The terminal result of [`Worker::run`].
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Complete {
        commit_sha: Option<String>,
        attempts: u32,
        final_tier: Tier,
    },
    Failed {
        reason: String,
        attempts: u32,
    },
    NeedsDecomposition {
        subtasks: Vec<String>,
        attempts: u32,
    },
}

/// What's written to `tasks/<id>/checkpoint.json` at every state boundary
/// (SPEC_FULL §3 "Checkpoint"), so a crashed Worker can be resumed by whatever
/// re-reads it (the Scheduler, on restart).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkerCheckpoint {
    phase: CheckpointPhase,
    current_tier: Tier,
    attempt: u32,
    saved_at: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_issue_count: Option<usize>,
}

enum ReviewOutcome {
    Converged,
    NotConverged,
}

/// Drives one task's Planning → Executing → Verifying → (Reviewing?) →
/// Committing → Complete cycle (SPEC_FULL §4.E), escalating tiers and
/// consulting the Capability Ledger and Error-Fix Pattern Store as it goes.
pub struct Worker<'a> {
    task_id: String,
    objective: String,
    working_dir: PathBuf,
    state_dir: PathBuf,
    config: WorkerConfig,
    ast_index: &'a AstIndex,
    verifier: &'a Verifier,
    ledger: &'a mut CapabilityLedger,
    fix_store: &'a mut ErrorFixPatternStore,
    event_log: &'a EventLog,
    sm: WorkerStateMachine,
    current_tier: Tier,
    retries_at_tier: u32,
    file_write_counts: HashMap<String, u32>,
    consecutive_no_write_attempts: u32,
    recent_error_prefixes: Vec<String>,
    last_known_error: Option<(String, String)>,
    token_history: Vec<AttemptRecord>,
    task_started_at: Instant,
}

impl<'a> Worker<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: impl Into<String>,
        objective: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        initial_tier: Tier,
        config: WorkerConfig,
        ast_index: &'a AstIndex,
        verifier: &'a Verifier,
        ledger: &'a mut CapabilityLedger,
        fix_store: &'a mut ErrorFixPatternStore,
        event_log: &'a EventLog,
    ) -> Self {
        Worker {
            task_id: task_id.into(),
            objective: objective.into(),
            working_dir: working_dir.into(),
            state_dir: state_dir.into(),
            config,
            ast_index,
            verifier,
            ledger,
            fix_store,
            event_log,
            sm: WorkerStateMachine::new(),
            current_tier: initial_tier,
            retries_at_tier: 0,
            file_write_counts: HashMap::new(),
            consecutive_no_write_attempts: 0,
            recent_error_prefixes: Vec::new(),
            last_known_error: None,
            token_history: Vec::new(),
            task_started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.sm.current()
    }

    pub fn current_tier(&self) -> Tier {
        self.current_tier
    }

    pub fn token_history(&self) -> &[AttemptRecord] {
        &self.token_history
    }

    /// Run the full attempt loop to completion, failure, or decomposition.
    pub async fn run(&mut self, factory: &mut dyn AgentFactory) -> anyhow::Result<WorkerOutcome> {
        self.event_log.append(&GrindEvent::TaskStart {
            ts: Utc::now(),
            task_id: self.task_id.clone(),
            task: self.objective.clone(),
            model: self.current_tier.as_str().to_string(),
        })?;

        loop {
            let attempt = self.sm.attempt() + 1;
            self.sm.set_attempt(attempt);

            self.save_checkpoint(CheckpointPhase::Planning, None)?;
            let known_error = self
                .last_known_error
                .as_ref()
                .map(|(category, message)| (category.as_str(), message.as_str()));
            let briefing = ContextBriefer::brief(
                &self.objective,
                self.ast_index,
                Some(&*self.fix_store),
                known_error,
                self.config.context_max_results,
            );

            self.sm.advance(WorkerState::Executing, None)?;
            self.save_checkpoint(CheckpointPhase::Executing, None)?;
            let attempt_started = Instant::now();
            let mut agent = factory.spawn(self.current_tier, "builder", &briefing).await;
            let stream_outcome = self.run_attempt_stream(agent.as_mut()).await;
            let attempt_duration_ms = attempt_started.elapsed().as_millis() as u64;

            if let Some(reason) = stream_outcome.forced_fail.clone() {
                self.push_attempt_record(&stream_outcome, attempt_duration_ms, false, Vec::new(), Vec::new());
                return self.finish_failed(&reason);
            }

            if let Some(marker) = stream_outcome.marker.clone() {
                match marker {
                    AgentMarker::TaskAlreadyComplete { .. } => {
                        self.push_attempt_record(&stream_outcome, attempt_duration_ms, true, Vec::new(), Vec::new());
                        self.ledger.record_completion(
                            &self.objective,
                            self.current_tier,
                            CompletionUpdate {
                                success: true,
                                escalated: false,
                                token_cost: Some(stream_outcome.usage.total()),
                                duration_ms: Some(attempt_duration_ms),
                                retries: Some(self.retries_at_tier as u64),
                            },
                        )?;
                        self.sm.advance(WorkerState::Verifying, Some("task already complete"))?;
                        self.sm.advance(WorkerState::Committing, None)?;
                        self.sm.advance(WorkerState::Complete, None)?;
                        self.event_log.append(&GrindEvent::TaskComplete {
                            ts: Utc::now(),
                            task_id: self.task_id.clone(),
                            sha: None,
                            model: self.current_tier.as_str().to_string(),
                            attempts: attempt,
                            duration_ms: self.task_started_at.elapsed().as_millis() as u64,
                        })?;
                        return Ok(WorkerOutcome::Complete {
                            commit_sha: None,
                            attempts: attempt,
                            final_tier: self.current_tier,
                        });
                    }
                    AgentMarker::InvalidTarget { reason } => {
                        self.push_attempt_record(&stream_outcome, attempt_duration_ms, false, Vec::new(), Vec::new());
                        return self.finish_failed(&format!("invalid target: {reason}"));
                    }
                    AgentMarker::NeedsDecomposition { reason } => {
                        let subtasks = marker.subtasks();
                        self.push_attempt_record(&stream_outcome, attempt_duration_ms, false, Vec::new(), Vec::new());
                        self.ledger.record_completion(
                            &self.objective,
                            self.current_tier,
                            CompletionUpdate {
                                success: false,
                                escalated: false,
                                token_cost: Some(stream_outcome.usage.total()),
                                duration_ms: Some(attempt_duration_ms),
                                retries: Some(self.retries_at_tier as u64),
                            },
                        )?;
                        self.sm.needs_decomposition(&reason)?;
                        return Ok(WorkerOutcome::NeedsDecomposition { subtasks, attempts: attempt });
                    }
                }
            }

            self.sm.advance(WorkerState::Verifying, None)?;
            self.save_checkpoint(CheckpointPhase::Verifying, None)?;
            let verification = self.verifier.run(&self.working_dir, None).await?;
            self.save_checkpoint(CheckpointPhase::Verifying, Some(&verification))?;
            self.push_attempt_record(
                &stream_outcome,
                attempt_duration_ms,
                verification.passed,
                verification.unique_categories().iter().map(|c| c.to_string()).collect(),
                verification.files_changed.clone(),
            );

            if verification.passed {
                let summary = format!("verification passed at {} tier", self.current_tier);
                self.fix_store.record_successful_fix(&self.task_id, &verification.files_changed, &summary)?;
                self.last_known_error = None;
                self.ledger.record_completion(
                    &self.objective,
                    self.current_tier,
                    CompletionUpdate {
                        success: true,
                        escalated: false,
                        token_cost: Some(stream_outcome.usage.total()),
                        duration_ms: Some(attempt_duration_ms),
                        retries: Some(self.retries_at_tier as u64),
                    },
                )?;

                match self.run_review_passes(factory, &briefing).await? {
                    ReviewOutcome::Converged => {}
                    ReviewOutcome::NotConverged => {
                        self.sm.advance(WorkerState::Executing, Some("review did not converge"))?;
                        self.retries_at_tier += 1;
                        continue;
                    }
                }

                self.sm.advance(WorkerState::Committing, None)?;
                self.save_checkpoint(CheckpointPhase::Committing, Some(&verification))?;
                let commit_sha = if self.config.auto_commit {
                    self.commit_changes(&verification.files_changed).await?
                } else {
                    None
                };
                self.sm.advance(WorkerState::Complete, None)?;
                self.event_log.append(&GrindEvent::TaskComplete {
                    ts: Utc::now(),
                    task_id: self.task_id.clone(),
                    sha: commit_sha.clone(),
                    model: self.current_tier.as_str().to_string(),
                    attempts: attempt,
                    duration_ms: self.task_started_at.elapsed().as_millis() as u64,
                })?;
                return Ok(WorkerOutcome::Complete { commit_sha, attempts: attempt, final_tier: self.current_tier });
            }

            let primary = verification.issues.first();
            let current_error_prefix = primary.map(|issue| error_prefix(&issue.message));
            if let Some(issue) = primary {
                self.fix_store.record_pending_error(
                    &self.task_id,
                    &issue.category.to_string(),
                    &issue.message,
                    verification.files_changed.clone(),
                )?;
                self.last_known_error = Some((issue.category.to_string(), issue.message.clone()));
            } else {
                self.fix_store.clear_pending(&self.task_id)?;
            }

            let known_fix_success_rate = primary.and_then(|issue| {
                self.fix_store
                    .find_fix_suggestions(&issue.category.to_string(), &issue.message)
                    .filter(|p| p.occurrence_count > 0)
                    .map(|p| p.fix_success_count as f64 / p.occurrence_count as f64)
            });
            let ledger_recommendation = Some(self.ledger.recommend(&self.objective));

            let decision = decide_escalation(&EscalationInputs {
                verification: &verification,
                current_tier: self.current_tier,
                retries_at_tier: self.retries_at_tier,
                files_changed_this_attempt: verification.files_changed.len(),
                no_op_count: stream_outcome.no_ops,
                consecutive_no_write_attempts: self.consecutive_no_write_attempts,
                file_write_counts: &self.file_write_counts,
                max_writes_per_file: self.config.max_writes_per_file,
                recent_error_prefixes: &self.recent_error_prefixes,
                current_error_prefix: current_error_prefix.as_deref(),
                ledger_recommendation,
                known_fix_success_rate,
                is_test_writing_task: self.objective.to_lowercase().contains("test"),
                budgets: self.config.budgets,
            });

            // Recorded only after the decision is made, so the Ralph-loop
            // check above sees prior attempts' history, never this one.
            if let Some(prefix) = current_error_prefix {
                self.recent_error_prefixes.push(prefix);
            }

            self.ledger.record_completion(
                &self.objective,
                self.current_tier,
                CompletionUpdate {
                    success: false,
                    escalated: matches!(decision, EscalationDecision::Escalate { .. }),
                    token_cost: Some(stream_outcome.usage.total()),
                    duration_ms: Some(attempt_duration_ms),
                    retries: Some(self.retries_at_tier as u64),
                },
            )?;

            match decision {
                EscalationDecision::Retry => {
                    self.retries_at_tier += 1;
                    self.sm.advance(WorkerState::Executing, Some("verification failed, retrying"))?;
                }
                EscalationDecision::Escalate { to_tier } => {
                    self.event_log.append(&GrindEvent::TaskEscalated {
                        ts: Utc::now(),
                        task_id: self.task_id.clone(),
                        from_model: self.current_tier.as_str().to_string(),
                        to_model: to_tier.as_str().to_string(),
                    })?;
                    self.current_tier = to_tier;
                    self.retries_at_tier = 0;
                    self.sm.advance(WorkerState::Executing, Some("escalating to a higher tier"))?;
                }
                EscalationDecision::Fail { reason, needs_decomposition_hint } => {
                    if needs_decomposition_hint {
                        self.sm.needs_decomposition(&reason)?;
                        return Ok(WorkerOutcome::NeedsDecomposition { subtasks: Vec::new(), attempts: attempt });
                    }
                    return self.finish_failed(&reason);
                }
            }
        }
    }

    /// Consume one agent invocation's event stream, tracking writes and
    /// markers and applying the stop gate (SPEC_FULL §4.E steps 2-3, §6).
    async fn run_attempt_stream(&mut self, agent: &mut dyn AgentSession) -> AttemptOutcome {
        let mut text_buffer = String::new();
        let mut pending_writes: HashMap<String, String> = HashMap::new();
        let mut outcome = AttemptOutcome::default();
        let mut stop_rejections = 0u32;

        while let Some(event) = agent.next_event().await {
            match event {
                AgentEvent::System { .. } => {}
                AgentEvent::AssistantText { text } => {
                    text_buffer.push_str(&text);
                    text_buffer.push('\n');
                    if outcome.marker.is_none() {
                        outcome.marker = first_marker(&text_buffer);
                    }
                }
                AgentEvent::ToolUse { id, name, input } => {
                    if WRITE_TOOLS.contains(&name.as_str()) {
                        let path = input
                            .get("file_path")
                            .or_else(|| input.get("path"))
                            .and_then(|v| v.as_str())
                            .unwrap_or("<unknown>")
                            .to_string();
                        pending_writes.insert(id, path);
                    }
                }
                AgentEvent::ToolResult { tool_use_id, is_error, content } => {
                    if let Some(path) = pending_writes.remove(&tool_use_id) {
                        let lower = content.to_lowercase();
                        let is_tool_use_error = lower.contains("tool_use_error") || lower.contains("tool use error");
                        if !is_error && !is_tool_use_error {
                            outcome.writes += 1;
                            *self.file_write_counts.entry(path).or_insert(0) += 1;
                            self.consecutive_no_write_attempts = 0;
                        } else if is_noop_result(&content) {
                            outcome.no_ops += 1;
                        }
                    }
                }
                AgentEvent::Result { usage } => {
                    outcome.usage = usage;
                    if outcome.marker.is_some() || outcome.writes > 0 || outcome.no_ops > 0 {
                        agent.respond_to_stop(true, None).await;
                        break;
                    }
                    stop_rejections += 1;
                    match stop_rejections {
                        1 => {
                            agent
                                .respond_to_stop(
                                    false,
                                    Some(
                                        "No changes have been made yet. Please continue working on the objective."
                                            .to_string(),
                                    ),
                                )
                                .await;
                        }
                        2 => {
                            agent
                                .respond_to_stop(
                                    false,
                                    Some(
                                        "You must make concrete progress before stopping. If the objective is too \
                                         large for one pass, respond with NEEDS_DECOMPOSITION: <subtask>; <subtask>; ..."
                                            .to_string(),
                                    ),
                                )
                                .await;
                        }
                        _ => {
                            agent.respond_to_stop(true, None).await;
                            outcome.forced_fail = Some("VAGUE_TASK".to_string());
                            break;
                        }
                    }
                }
            }
        }

        outcome.stop_rejections = stop_rejections;
        if outcome.writes == 0 && outcome.no_ops == 0 {
            self.consecutive_no_write_attempts += 1;
        }
        outcome
    }

    /// Run up to the tier's review-pass budget after a passing verification.
    /// Converges when a pass makes no further writes; a pass that writes but
    /// fails reverification is non-convergence (SPEC_FULL §4.E, Open
    /// Question: review always runs after verification, never before).
    async fn run_review_passes(
        &mut self,
        factory: &mut dyn AgentFactory,
        briefing: &Briefing,
    ) -> anyhow::Result<ReviewOutcome> {
        let max_passes = if self.current_tier == Tier::Human {
            self.config.max_review_passes_at_top_tier
        } else {
            self.config.max_review_passes_per_tier
        };
        if max_passes == 0 {
            return Ok(ReviewOutcome::Converged);
        }

        self.sm.advance(WorkerState::Reviewing, None)?;
        self.save_checkpoint(CheckpointPhase::Reviewing, None)?;

        for pass in 0..max_passes {
            let mut agent = factory.spawn(self.current_tier, "reviewer", briefing).await;
            let outcome = self.run_attempt_stream(agent.as_mut()).await;
            if outcome.forced_fail.is_some() {
                return Ok(ReviewOutcome::NotConverged);
            }
            if outcome.writes == 0 {
                return Ok(ReviewOutcome::Converged);
            }
            tracing::debug!(task_id = %self.task_id, pass, "review pass edited files, reverifying");
            let verification = self.verifier.run(&self.working_dir, None).await?;
            if !verification.passed {
                return Ok(ReviewOutcome::NotConverged);
            }
        }
        Ok(ReviewOutcome::Converged)
    }

    /// Stage and commit all changes, grounded on the teacher corpus's
    /// `git_commit_changes`: `git add .` (respects `.gitignore`), then a
    /// `--cached --quiet` diff check before committing.
    async fn commit_changes(&self, files_changed: &[String]) -> anyhow::Result<Option<String>> {
        let add = tokio::process::Command::new("git")
            .args(["add", "."])
            .current_dir(&self.working_dir)
            .output()
            .await?;
        if !add.status.success() {
            anyhow::bail!("git add failed: {}", String::from_utf8_lossy(&add.stderr));
        }

        let diff = tokio::process::Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(&self.working_dir)
            .status()
            .await?;
        if diff.success() {
            return Ok(None);
        }

        let subject = build_subject(&self.objective, files_changed);
        let commit = tokio::process::Command::new("git")
            .args(["commit", "-m", &subject])
            .current_dir(&self.working_dir)
            .output()
            .await?;
        if !commit.status.success() {
            anyhow::bail!("git commit failed: {}", String::from_utf8_lossy(&commit.stderr));
        }

        let rev = tokio::process::Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&self.working_dir)
            .output()
            .await?;
        if !rev.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&rev.stdout).trim().to_string()))
    }

    fn push_attempt_record(
        &mut self,
        outcome: &AttemptOutcome,
        duration_ms: u64,
        success: bool,
        error_categories: Vec<String>,
        files_modified: Vec<String>,
    ) {
        self.token_history.push(AttemptRecord {
            token_count: outcome.usage.total(),
            duration_ms,
            success,
            error_categories,
            files_modified,
        });
    }

    fn finish_failed(&mut self, reason: &str) -> anyhow::Result<WorkerOutcome> {
        self.sm.fail(reason)?;
        self.event_log.append(&GrindEvent::TaskFailed {
            ts: Utc::now(),
            task_id: self.task_id.clone(),
            error: reason.to_string(),
            error_category: None,
        })?;
        Ok(WorkerOutcome::Failed { reason: reason.to_string(), attempts: self.sm.attempt() })
    }

    fn save_checkpoint(&self, phase: CheckpointPhase, verification: Option<&VerificationResult>) -> anyhow::Result<()> {
        let checkpoint = WorkerCheckpoint {
            phase,
            current_tier: self.current_tier,
            attempt: self.sm.attempt(),
            saved_at: Utc::now(),
            verification_passed: verification.map(|v| v.passed),
            verification_issue_count: verification.map(|v| v.issues.len()),
        };
        let path = checkpoint_path(&self.state_dir, &self.task_id);
        atomic_write_json(&path, &checkpoint)?;
        Ok(())
    }
}
