//! The Capability Ledger — keyword-keyed per-model-tier statistics and a
//! model-tier recommendation query (SPEC_FULL §4.C).
//!
//! Grounded on the teacher corpus's `escalation::state` module: the tier
//! enum and its budget/cost modeling are renamed from `SwarmTier` to `Tier`
//! (same three-tier semantics) since this domain already owns that concept
//! under a different name.

mod keywords;
mod ledger;
mod model;

pub use keywords::{extract_tokens, matched_action_keywords};
pub use ledger::CapabilityLedger;
pub use model::{
    CapabilityLedgerDocument, CompletionUpdate, KeywordEntry, Recommendation, Tier, TierCounters,
    ACTION_VOCABULARY, CAPABILITY_LEDGER_VERSION,
};
