//! Error-Fix Pattern Store document shape (SPEC_FULL §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ERROR_FIX_PATTERNS_VERSION: u32 = 1;
pub const MAX_FIXES_PER_PATTERN: usize = 5;
pub const MAX_PENDING_ENTRIES: usize = 10;
pub const MAX_SAMPLE_MESSAGE_CHARS: usize = 500;

/// One recorded successful fix for a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixRecord {
    #[serde(rename = "filesChanged")]
    pub files_changed: Vec<String>,
    #[serde(rename = "editSummary")]
    pub edit_summary: String,
    #[serde(rename = "recordedAt")]
    pub recorded_at: DateTime<Utc>,
}

/// `error-fix-patterns.json`'s per-signature entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorFixPattern {
    pub signature: String,
    #[serde(rename = "sampleMessage")]
    pub sample_message: String,
    #[serde(rename = "occurrenceCount", default)]
    pub occurrence_count: u64,
    #[serde(rename = "fixSuccessCount", default)]
    pub fix_success_count: u64,
    #[serde(default)]
    pub fixes: Vec<FixRecord>,
    #[serde(rename = "firstSeen")]
    pub first_seen: DateTime<Utc>,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

/// A pending (unresolved) error captured at the time a task attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingError {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub signature: String,
    pub category: String,
    pub message: String,
    #[serde(rename = "filesAtCapture", default)]
    pub files_at_capture: Vec<String>,
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

/// `error-fix-patterns.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorFixPatternsDocument {
    pub version: u32,
    #[serde(default)]
    pub patterns: BTreeMap<String, ErrorFixPattern>,
    #[serde(default)]
    pub pending: Vec<PendingError>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl Default for ErrorFixPatternsDocument {
    fn default() -> Self {
        ErrorFixPatternsDocument {
            version: ERROR_FIX_PATTERNS_VERSION,
            patterns: BTreeMap::new(),
            pending: Vec::new(),
            last_updated: DateTime::UNIX_EPOCH,
        }
    }
}
