//! The Worker — per-task state machine that alternates agent attempts with
//! verification and learns from failure (SPEC_FULL §4.E).
//!
//! Grounded on the teacher corpus's `crates/swarm-agents/src/state_machine.rs`
//! (explicit states, legal-transition table, checkpoint/resume) and
//! `coordination/src/escalation/state.rs` (tier budgets, escalation reasons,
//! no-change/progress tracking), generalized from the teacher's fixed
//! compile-verify-validate-merge pipeline to this domain's
//! planning/executing/verifying/reviewing/committing cycle.

mod escalation;
mod markers;
mod state;
mod worker_impl;

pub use escalation::{decide_escalation, EscalationDecision, EscalationInputs};
pub use markers::{parse_markers, AgentMarker};
pub use state::{IllegalTransition, WorkerState, WorkerStateMachine};
pub use worker_impl::{AgentFactory, AttemptOutcome, Worker, WorkerConfig, WorkerOutcome};
