//! Undercity kernel: the persistent, toolchain-agnostic core shared by
//! every agent and orchestrator process working a raid.
//!
//! This crate owns:
//! - Atomic JSON/JSONL persistence for all on-disk state (`state`, `events`)
//! - The Verifier, which runs typecheck/lint/test/build gates and reduces
//!   their native output to structured issues (`verifier`)
//! - The AST Index, a persistent per-file symbol/import map used to find
//!   relevant files for a task objective (`ast_index`)
//! - The Capability Ledger, which tracks which tier (worker/council/human)
//!   historically succeeds at which kind of task (`capability_ledger`)
//! - The Error-Fix Pattern Store, which recognizes recurring errors and
//!   recalls how they were fixed before (`error_fix_patterns`)
//!
//! None of these modules know about LLM providers, process orchestration,
//! or scheduling — that belongs to the orchestrator crate built on top of
//! this one.

#![allow(clippy::uninlined_format_args)]

pub mod ast_index;
pub mod capability_ledger;
pub mod error_fix_patterns;
pub mod events;
pub mod state;
pub mod verifier;

pub use ast_index::{
    AstIndex, AstIndexDocument, ExportKind, ExportedSymbol, FileRecord, ImportRecord,
    RelevantFile, AST_INDEX_VERSION,
};

pub use capability_ledger::{
    CapabilityLedger, CapabilityLedgerDocument, CompletionUpdate, KeywordEntry, Recommendation,
    Tier, TierCounters, ACTION_VOCABULARY, CAPABILITY_LEDGER_VERSION,
};

pub use error_fix_patterns::{
    ErrorFixPattern, ErrorFixPatternStore, ErrorFixPatternsDocument, FixRecord, PendingError,
    ERROR_FIX_PATTERNS_VERSION,
};

pub use events::{is_grind_running, EventLog, EventLogError, GrindEvent};

pub use state::{
    atomic_write_json, assignment_path, checkpoint_path, clean_stray_tmp, tolerant_load_json,
    AttemptRecord, CheckpointPhase, CompletedRaid, Inventory, Pocket, PlannedTask, RaidRecord,
    RaidStatus, Stash, StateError, TaskAssignment, TaskRecord, TaskStatus,
};

pub use verifier::{
    CheckConfig, CheckKind, Issue, IssueCategory, VerificationResult, Verifier, VerifierConfig,
    VerifierError,
};
