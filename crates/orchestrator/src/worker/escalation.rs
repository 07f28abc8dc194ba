//! Escalation decision (SPEC_FULL §4.E "Escalation decision").
//!
//! Grounded on the teacher corpus's `coordination::escalation::state` and
//! `coordination::escalation::engine` (tier budgets, repeated-error and
//! no-change detection, progress tracking), generalized from the teacher's
//! fixed compiler-error categories to this domain's typecheck/lint/test/
//! build/spell/unknown taxonomy and its learning-system-adjusted budgets.

use std::collections::HashMap;
use undercity_kernel::{IssueCategory, Recommendation, Tier, VerificationResult};

/// Configuration inputs that shape escalation budgets (SPEC_FULL §4.E
/// "Configuration").
#[derive(Debug, Clone, Copy)]
pub struct EscalationBudgets {
    pub max_retries_per_tier: u32,
    pub max_retries_at_top_tier: u32,
}

impl Default for EscalationBudgets {
    fn default() -> Self {
        EscalationBudgets { max_retries_per_tier: 3, max_retries_at_top_tier: 2 }
    }
}

/// Everything the escalation decision needs about the current attempt and
/// the task's history so far (SPEC_FULL §4.E).
pub struct EscalationInputs<'a> {
    pub verification: &'a VerificationResult,
    pub current_tier: Tier,
    pub retries_at_tier: u32,
    pub files_changed_this_attempt: usize,
    pub no_op_count: u32,
    pub consecutive_no_write_attempts: u32,
    pub file_write_counts: &'a HashMap<String, u32>,
    pub max_writes_per_file: u32,
    /// First-80-char prefixes of the primary error message from *prior*
    /// attempts at this tier, oldest first. Does not include this attempt's
    /// error; see `current_error_prefix`.
    pub recent_error_prefixes: &'a [String],
    /// First-80-char prefix of this attempt's primary error message, if any.
    pub current_error_prefix: Option<&'a str>,
    pub ledger_recommendation: Option<Recommendation>,
    pub known_fix_success_rate: Option<f64>,
    pub is_test_writing_task: bool,
    pub budgets: EscalationBudgets,
}

/// The outcome of an escalation decision.
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationDecision {
    /// Loop back into `Executing` at the same tier with the given feedback.
    Retry,
    /// Bump the model tier and loop back into `Executing`.
    Escalate { to_tier: Tier },
    /// Terminate the task as failed.
    Fail { reason: String, needs_decomposition_hint: bool },
}

const RALPH_REPEAT_THRESHOLD: usize = 2;
const RALPH_PREFIX_LEN: usize = 80;
const NO_CHANGE_ATTEMPT_THRESHOLD: u32 = 2;
const LEDGER_STRONG_CONFIDENCE: f64 = 0.7;
const KNOWN_FIX_STRONG_SUCCESS_RATE: f64 = 0.5;

/// First 80 chars of `message`, for the Ralph-loop repeated-error check.
pub fn error_prefix(message: &str) -> String {
    message.chars().take(RALPH_PREFIX_LEN).collect()
}

fn next_tier(tier: Tier) -> Option<Tier> {
    match tier {
        Tier::Worker => Some(Tier::Council),
        Tier::Council => Some(Tier::Human),
        Tier::Human => None,
    }
}

fn is_final_tier(tier: Tier) -> bool {
    tier == Tier::Human
}

/// Classify this attempt's issues as trivial-only (lint/spell), serious
/// (typecheck/build/test), or neither (SPEC_FULL §4.E checks 5/6/7).
enum Severity {
    TrivialOnly,
    Serious,
    Other,
}

fn classify_severity(verification: &VerificationResult) -> Severity {
    let categories: std::collections::HashSet<IssueCategory> =
        verification.issues.iter().map(|i| i.category).collect();
    if categories.is_empty() {
        return Severity::Other;
    }
    let trivial = |c: &IssueCategory| matches!(c, IssueCategory::Lint | IssueCategory::Spell);
    let serious = |c: &IssueCategory| matches!(c, IssueCategory::Typecheck | IssueCategory::Build | IssueCategory::Test);

    if categories.iter().all(trivial) {
        Severity::TrivialOnly
    } else if categories.iter().any(serious) {
        Severity::Serious
    } else {
        Severity::Other
    }
}

/// Decide whether to retry, escalate, or fail the task after a failed
/// verification (SPEC_FULL §4.E "Escalation decision").
///
/// Checks run in order; the first matching check wins.
pub fn decide_escalation(inputs: &EscalationInputs<'_>) -> EscalationDecision {
    // Check 1: Ralph loop — this attempt's error already appeared >= 2 times
    // in prior attempts at this tier (i.e. this is its 3rd consecutive
    // occurrence).
    if let Some(current) = inputs.current_error_prefix {
        let prior_repeats = inputs.recent_error_prefixes.iter().filter(|p| p.as_str() == current).count();
        if prior_repeats >= RALPH_REPEAT_THRESHOLD {
            return EscalationDecision::Fail {
                reason: "the agent is stuck: the same error has repeated".to_string(),
                needs_decomposition_hint: false,
            };
        }
    }

    // Check 2: file thrashing.
    if inputs
        .file_write_counts
        .values()
        .any(|&count| count >= inputs.max_writes_per_file)
    {
        return EscalationDecision::Fail {
            reason: "file thrashing: a file was rewritten past the thrashing threshold".to_string(),
            needs_decomposition_hint: false,
        };
    }

    // Check 3: no changes at all.
    if inputs.files_changed_this_attempt == 0 && inputs.no_op_count == 0 {
        if inputs.consecutive_no_write_attempts >= NO_CHANGE_ATTEMPT_THRESHOLD {
            return EscalationDecision::Fail {
                reason: "no file changes were produced across consecutive attempts".to_string(),
                needs_decomposition_hint: true,
            };
        }
        return EscalationDecision::Retry;
    }

    // Learning-adjusted budget, applied before the remaining tier/severity checks.
    let mut effective_budget = inputs.budgets.max_retries_per_tier;
    if let Some(rec) = &inputs.ledger_recommendation {
        if rec.confidence >= LEDGER_STRONG_CONFIDENCE && rec.tier > inputs.current_tier {
            effective_budget = effective_budget.saturating_sub(1);
        }
    }
    if let Some(rate) = inputs.known_fix_success_rate {
        if rate >= KNOWN_FIX_STRONG_SUCCESS_RATE {
            effective_budget += 1;
        }
    }

    // Check 4: already at the final tier.
    if is_final_tier(inputs.current_tier) {
        if inputs.retries_at_tier < inputs.budgets.max_retries_at_top_tier {
            return EscalationDecision::Retry;
        }
        return EscalationDecision::Fail {
            reason: "max retries at final tier".to_string(),
            needs_decomposition_hint: false,
        };
    }

    let budget = match classify_severity(inputs.verification) {
        // Check 5: trivial-only.
        Severity::TrivialOnly => effective_budget,
        // Check 6: serious.
        Severity::Serious => {
            let mut b = effective_budget.saturating_sub(1).max(2);
            if inputs.is_test_writing_task {
                b += 1;
            }
            b
        }
        // Check 7: otherwise.
        Severity::Other => effective_budget,
    };

    if inputs.retries_at_tier < budget {
        EscalationDecision::Retry
    } else {
        let to_tier = next_tier(inputs.current_tier).expect("non-final tier always has a next tier");
        EscalationDecision::Escalate { to_tier }
    }
}
