//! The Capability Ledger: keyword-keyed per-tier statistics and the
//! model-tier recommendation query (SPEC_FULL §4.C).

use super::keywords::matched_action_keywords;
use super::model::{CapabilityLedgerDocument, CompletionUpdate, KeywordEntry, Recommendation, Tier};
use crate::state::{atomic_write_json, tolerant_load_json, StateError};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// With fewer than this many total ledger entries, the recommendation
/// query has nothing to go on and falls back to the default tier.
const MIN_ENTRIES_FOR_DATA_DRIVEN_RECOMMENDATION: u64 = 5;
const MIN_ATTEMPTS_FOR_CANDIDACY: u64 = 3;
const MIN_SUCCESS_RATE_FOR_CANDIDACY: f64 = 0.6;

pub struct CapabilityLedger {
    path: PathBuf,
    doc: CapabilityLedgerDocument,
}

impl CapabilityLedger {
    pub fn open(state_dir: &Path) -> Self {
        let path = state_dir.join(crate::state::CAPABILITY_LEDGER_FILE);
        let doc = tolerant_load_json(&path);
        CapabilityLedger { path, doc }
    }

    /// Extract matched action keywords from `objective` and apply `update`
    /// to each keyword's counters for `tier` (SPEC_FULL §4.C).
    pub fn record_completion(&mut self, objective: &str, tier: Tier, update: CompletionUpdate) -> Result<(), StateError> {
        let keywords = matched_action_keywords(objective);
        if keywords.is_empty() {
            return Ok(());
        }
        for keyword in keywords {
            if !self.doc.patterns.contains_key(keyword) {
                self.doc.total_entries += 1;
            }
            let entry = self.doc.patterns.entry(keyword.to_string()).or_default();
            let counters = entry.counters_mut(tier);
            counters.attempts += 1;
            if update.success {
                counters.successes += 1;
            }
            if update.escalated {
                counters.escalations += 1;
            }
            counters.total_tokens += update.token_cost.unwrap_or(0);
            counters.total_duration_ms += update.duration_ms.unwrap_or(0);
            counters.total_retries += update.retries.unwrap_or(0);
        }
        self.persist()
    }

    /// Recommend a model tier for `objective`, with confidence (SPEC_FULL §4.C).
    pub fn recommend(&self, objective: &str) -> Recommendation {
        let keywords = matched_action_keywords(objective);
        if self.doc.total_entries < MIN_ENTRIES_FOR_DATA_DRIVEN_RECOMMENDATION || keywords.is_empty() {
            return Recommendation {
                tier: Tier::Council,
                confidence: 0.3,
            };
        }

        let aggregated: Vec<(Tier, super::model::TierCounters)> = Tier::ALL
            .into_iter()
            .map(|tier| (tier, self.aggregate(&keywords, tier)))
            .collect();

        let candidate = aggregated
            .iter()
            .filter(|(_, c)| c.attempts >= MIN_ATTEMPTS_FOR_CANDIDACY && c.success_rate() >= MIN_SUCCESS_RATE_FOR_CANDIDACY)
            .map(|(tier, c)| {
                let expected_value = c.success_rate() / (tier.relative_cost() * c.avg_retries().max(1.0));
                (*tier, expected_value, c.success_rate())
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((tier, _, success_rate)) = candidate {
            return Recommendation {
                tier,
                confidence: success_rate.min(0.9),
            };
        }

        let council = &aggregated[Tier::Council as usize].1;
        let human = &aggregated[Tier::Human as usize].1;
        let (tier, confidence) = if council.success_rate() >= 0.8 && council.escalation_rate() < 0.2 {
            (Tier::Council, 0.85)
        } else if council.escalation_rate() >= 0.3 || human.success_rate() > 0.5 {
            (Tier::Human, 0.85)
        } else {
            (Tier::Council, 0.3)
        };
        Recommendation { tier, confidence }
    }

    fn aggregate(&self, keywords: &[&str], tier: Tier) -> super::model::TierCounters {
        let mut total = super::model::TierCounters::default();
        for keyword in keywords {
            if let Some(entry) = self.doc.patterns.get(*keyword) {
                let c = entry.counters(tier);
                total.attempts += c.attempts;
                total.successes += c.successes;
                total.escalations += c.escalations;
                total.total_tokens += c.total_tokens;
                total.total_duration_ms += c.total_duration_ms;
                total.total_retries += c.total_retries;
            }
        }
        total
    }

    fn persist(&mut self) -> Result<(), StateError> {
        self.doc.last_updated = Utc::now();
        atomic_write_json(&self.path, &self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_historical_data_recommends_middle_tier_low_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CapabilityLedger::open(dir.path());
        let rec = ledger.recommend("Fix the login bug");
        assert_eq!(rec.tier, Tier::Council);
        assert_eq!(rec.confidence, 0.3);
    }

    #[test]
    fn no_matched_keywords_recommends_middle_tier_low_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = CapabilityLedger::open(dir.path());
        for i in 0..6 {
            ledger
                .record_completion(
                    &format!("fix bug {i}"),
                    Tier::Worker,
                    CompletionUpdate {
                        success: true,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let rec = ledger.recommend("hello world");
        assert_eq!(rec.tier, Tier::Council);
        assert_eq!(rec.confidence, 0.3);
    }

    #[test]
    fn strong_worker_track_record_is_recommended() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = CapabilityLedger::open(dir.path());
        // Build up enough entries (>=5) and a strong worker-tier track record
        // for "fix".
        for verb in ["fix", "add", "remove", "update", "clean"] {
            ledger
                .record_completion(
                    &format!("{verb} something"),
                    Tier::Worker,
                    CompletionUpdate {
                        success: true,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        for _ in 0..4 {
            ledger
                .record_completion(
                    "fix another bug",
                    Tier::Worker,
                    CompletionUpdate {
                        success: true,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let rec = ledger.recommend("fix this bug please");
        assert_eq!(rec.tier, Tier::Worker);
        assert!(rec.confidence > 0.6);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ledger = CapabilityLedger::open(dir.path());
            ledger
                .record_completion(
                    "fix the bug",
                    Tier::Worker,
                    CompletionUpdate {
                        success: true,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let reloaded = CapabilityLedger::open(dir.path());
        assert_eq!(reloaded.doc.total_entries, 1);
        assert_eq!(reloaded.doc.patterns["fix"].worker.attempts, 1);
    }
}
