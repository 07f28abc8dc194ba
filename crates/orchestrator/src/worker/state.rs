//! Explicit Worker states and legal transitions (SPEC_FULL §4.E).
//!
//! Grounded on the teacher corpus's `state_machine::OrchestratorState`: same
//! "typed state + legal-transition guard + transition log" shape, adapted
//! from the teacher's select/prepare/plan/implement/verify/validate/
//! escalate/merge cycle to the planning/executing/verifying/(reviewing)/
//! committing cycle this domain's data model names (SPEC_FULL §3 "Task").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Worker states (SPEC_FULL §4.E). Initial state is `Planning`; terminal
/// states are `Complete`, `Failed`, and `NeedsDecomposition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Planning,
    Executing,
    Verifying,
    Reviewing,
    Committing,
    Complete,
    Failed,
    NeedsDecomposition,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::NeedsDecomposition)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Verifying => "verifying",
            Self::Reviewing => "reviewing",
            Self::Committing => "committing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::NeedsDecomposition => "needs_decomposition",
        };
        write!(f, "{s}")
    }
}

/// Legal transitions, matching the diagram in SPEC_FULL §4.E:
/// ```text
/// planning → executing → verifying → (reviewing?) → committing → complete
///                   ↑         ↓
///                   └────── (retry)
///                             ↓
///                        escalated (model tier up, re-enters executing)
///                             ↓
///                          failed
/// ```
fn is_legal_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    if matches!(to, Failed | NeedsDecomposition) && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Planning, Executing)
            | (Executing, Verifying)
            // retry loop: verification failed, or review didn't converge
            | (Verifying, Executing)
            | (Reviewing, Executing)
            // escalation re-enters at a higher tier, same Executing state
            | (Verifying, Reviewing)
            | (Verifying, Committing)
            | (Reviewing, Committing)
            | (Committing, Complete)
    )
}

#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: WorkerState,
    pub to: WorkerState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal worker state transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// A single recorded transition, kept for diagnostics and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTransitionRecord {
    pub from: WorkerState,
    pub to: WorkerState,
    pub attempt: u32,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The Worker's state machine: current state, attempt counter, and a log of
/// every transition for diagnostics (SPEC_FULL §4.E).
#[derive(Debug)]
pub struct WorkerStateMachine {
    current: WorkerState,
    attempt: u32,
    created_at: Instant,
    transitions: Vec<WorkerTransitionRecord>,
}

impl WorkerStateMachine {
    pub fn new() -> Self {
        WorkerStateMachine {
            current: WorkerState::Planning,
            attempt: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> WorkerState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[WorkerTransitionRecord] {
        &self.transitions
    }

    pub fn advance(&mut self, to: WorkerState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition { from: self.current, to });
        }
        tracing::debug!(from = %self.current, to = %to, attempt = self.attempt, "worker state transition");
        self.transitions.push(WorkerTransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(WorkerState::Failed, Some(reason))
    }

    pub fn needs_decomposition(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(WorkerState::NeedsDecomposition, Some(reason))
    }
}

impl Default for WorkerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_planning() {
        let sm = WorkerStateMachine::new();
        assert_eq!(sm.current(), WorkerState::Planning);
        assert!(!sm.is_terminal());
    }

    #[test]
    fn happy_path_to_complete() {
        let mut sm = WorkerStateMachine::new();
        sm.advance(WorkerState::Executing, None).unwrap();
        sm.advance(WorkerState::Verifying, None).unwrap();
        sm.advance(WorkerState::Committing, None).unwrap();
        sm.advance(WorkerState::Complete, None).unwrap();
        assert!(sm.is_terminal());
    }

    #[test]
    fn review_pass_then_commit() {
        let mut sm = WorkerStateMachine::new();
        sm.advance(WorkerState::Executing, None).unwrap();
        sm.advance(WorkerState::Verifying, None).unwrap();
        sm.advance(WorkerState::Reviewing, None).unwrap();
        sm.advance(WorkerState::Committing, None).unwrap();
        sm.advance(WorkerState::Complete, None).unwrap();
        assert!(sm.is_terminal());
    }

    #[test]
    fn retry_loop_from_verifying() {
        let mut sm = WorkerStateMachine::new();
        sm.advance(WorkerState::Executing, None).unwrap();
        sm.advance(WorkerState::Verifying, None).unwrap();
        sm.advance(WorkerState::Executing, Some("verification failed, retrying")).unwrap();
        sm.advance(WorkerState::Verifying, None).unwrap();
        sm.advance(WorkerState::Committing, None).unwrap();
        sm.advance(WorkerState::Complete, None).unwrap();
        assert!(sm.is_terminal());
    }

    #[test]
    fn review_non_convergence_retries() {
        let mut sm = WorkerStateMachine::new();
        sm.advance(WorkerState::Executing, None).unwrap();
        sm.advance(WorkerState::Verifying, None).unwrap();
        sm.advance(WorkerState::Reviewing, None).unwrap();
        sm.advance(WorkerState::Executing, Some("review did not converge")).unwrap();
        assert_eq!(sm.current(), WorkerState::Executing);
    }

    #[test]
    fn can_fail_from_any_non_terminal_state() {
        for state in [
            WorkerState::Planning,
            WorkerState::Executing,
            WorkerState::Verifying,
            WorkerState::Reviewing,
            WorkerState::Committing,
        ] {
            let mut sm = WorkerStateMachine {
                current: state,
                attempt: 0,
                created_at: Instant::now(),
                transitions: Vec::new(),
            };
            sm.fail("boom").unwrap();
            assert_eq!(sm.current(), WorkerState::Failed);
        }
    }

    #[test]
    fn cannot_leave_terminal_state() {
        let mut sm = WorkerStateMachine::new();
        sm.fail("nope").unwrap();
        assert!(sm.advance(WorkerState::Executing, None).is_err());
        assert!(sm.fail("again").is_err());
    }

    #[test]
    fn cannot_skip_executing() {
        let mut sm = WorkerStateMachine::new();
        let err = sm.advance(WorkerState::Verifying, None).unwrap_err();
        assert_eq!(err.from, WorkerState::Planning);
        assert_eq!(err.to, WorkerState::Verifying);
    }

    #[test]
    fn needs_decomposition_is_terminal() {
        let mut sm = WorkerStateMachine::new();
        sm.advance(WorkerState::Executing, None).unwrap();
        sm.needs_decomposition("decompose into: a; b").unwrap();
        assert!(sm.is_terminal());
        assert_eq!(sm.current(), WorkerState::NeedsDecomposition);
    }
}
