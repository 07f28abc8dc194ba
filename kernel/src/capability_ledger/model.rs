//! Capability Ledger document shape and the closed keyword/tier vocabularies
//! (SPEC_FULL §3, §4.C).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CAPABILITY_LEDGER_VERSION: u32 = 1;

/// The closed action vocabulary: objectives are matched against these verbs
/// to find which keyword counters to update/aggregate. Named after the
/// teacher's own `SwarmTier` modeling (same tier semantics, relabeled for
/// this domain) rather than invented fresh.
pub const ACTION_VOCABULARY: &[&str] = &[
    "add", "fix", "refactor", "remove", "update", "implement", "create", "delete", "rename",
    "extract", "optimize", "test", "document", "migrate", "upgrade", "downgrade", "configure",
    "integrate", "debug", "investigate", "research", "review", "validate", "clean", "simplify",
    "consolidate", "deprecate", "restore", "revert", "rewrite",
];

/// The three escalation tiers, named after the teacher corpus's `SwarmTier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Worker,
    Council,
    Human,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Worker, Tier::Council, Tier::Human];

    /// Relative cost table used by the expected-value recommendation formula
    /// (SPEC_FULL §4.C).
    pub fn relative_cost(self) -> f64 {
        match self {
            Tier::Worker => 1.0,
            Tier::Council => 4.0,
            Tier::Human => 10.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Worker => "worker",
            Tier::Council => "council",
            Tier::Human => "human",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-(keyword, tier) counters. All fields are monotonically
/// non-decreasing under normal operation (SPEC_FULL §3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TierCounters {
    pub attempts: u64,
    pub successes: u64,
    pub escalations: u64,
    #[serde(rename = "totalTokens")]
    pub total_tokens: u64,
    #[serde(rename = "totalDurationMs")]
    pub total_duration_ms: u64,
    #[serde(rename = "totalRetries")]
    pub total_retries: u64,
}

impl TierCounters {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn escalation_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.escalations as f64 / self.attempts as f64
        }
    }

    pub fn avg_retries(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.total_retries as f64 / self.attempts as f64
        }
    }
}

/// Per-keyword entry: a counter set per tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KeywordEntry {
    #[serde(default)]
    pub worker: TierCounters,
    #[serde(default)]
    pub council: TierCounters,
    #[serde(default)]
    pub human: TierCounters,
}

impl KeywordEntry {
    pub fn counters(&self, tier: Tier) -> &TierCounters {
        match tier {
            Tier::Worker => &self.worker,
            Tier::Council => &self.council,
            Tier::Human => &self.human,
        }
    }

    pub fn counters_mut(&mut self, tier: Tier) -> &mut TierCounters {
        match tier {
            Tier::Worker => &mut self.worker,
            Tier::Council => &mut self.council,
            Tier::Human => &mut self.human,
        }
    }
}

/// `capability-ledger.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityLedgerDocument {
    pub version: u32,
    #[serde(default)]
    pub patterns: BTreeMap<String, KeywordEntry>,
    #[serde(rename = "totalEntries", default)]
    pub total_entries: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Default for CapabilityLedgerDocument {
    fn default() -> Self {
        CapabilityLedgerDocument {
            version: CAPABILITY_LEDGER_VERSION,
            patterns: BTreeMap::new(),
            total_entries: 0,
            last_updated: chrono::DateTime::UNIX_EPOCH,
        }
    }
}

/// An update to apply to one keyword's tier counters on task completion
/// (SPEC_FULL §4.C).
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionUpdate {
    pub success: bool,
    pub escalated: bool,
    pub token_cost: Option<u64>,
    pub duration_ms: Option<u64>,
    pub retries: Option<u64>,
}

/// A model-tier recommendation with confidence (SPEC_FULL §4.C).
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub tier: Tier,
    pub confidence: f64,
}
