//! The Error-Fix Pattern Store: record pending errors and successful
//! fixes, and answer fix-suggestion queries (SPEC_FULL §4.D).

use super::model::{
    ErrorFixPattern, ErrorFixPatternsDocument, FixRecord, PendingError, MAX_FIXES_PER_PATTERN,
    MAX_PENDING_ENTRIES, MAX_SAMPLE_MESSAGE_CHARS,
};
use super::signature::generate_signature;
use crate::state::{atomic_write_json, tolerant_load_json, StateError};
use chrono::Utc;
use std::path::{Path, PathBuf};

pub struct ErrorFixPatternStore {
    path: PathBuf,
    doc: ErrorFixPatternsDocument,
}

impl ErrorFixPatternStore {
    pub fn open(state_dir: &Path) -> Self {
        let path = state_dir.join(crate::state::ERROR_FIX_PATTERNS_FILE);
        let doc = tolerant_load_json(&path);
        ErrorFixPatternStore { path, doc }
    }

    /// Record a pending (unresolved) error for `task_id`: allocate or
    /// update the matching pattern, then append to the bounded pending
    /// queue, dropping the oldest entry beyond [`MAX_PENDING_ENTRIES`]
    /// (SPEC_FULL §4.D).
    pub fn record_pending_error(
        &mut self,
        task_id: &str,
        category: &str,
        message: &str,
        files_at_capture: Vec<String>,
    ) -> Result<String, StateError> {
        let signature = generate_signature(category, message);
        let now = Utc::now();
        let truncated_message = truncate_chars(message, MAX_SAMPLE_MESSAGE_CHARS);

        let pattern = self.doc.patterns.entry(signature.clone()).or_insert_with(|| ErrorFixPattern {
            signature: signature.clone(),
            sample_message: truncated_message.clone(),
            occurrence_count: 0,
            fix_success_count: 0,
            fixes: Vec::new(),
            first_seen: now,
            last_seen: now,
        });
        pattern.occurrence_count += 1;
        pattern.last_seen = now;

        self.doc.pending.push(PendingError {
            task_id: task_id.to_string(),
            signature: signature.clone(),
            category: category.to_string(),
            message: truncated_message,
            files_at_capture,
            captured_at: now,
        });
        if self.doc.pending.len() > MAX_PENDING_ENTRIES {
            self.doc.pending.remove(0);
        }

        self.persist()?;
        Ok(signature)
    }

    /// Record a successful fix for the pending entry matching `task_id`.
    /// `files_now` is the file set at fix time; the files attributed to the
    /// fix are `files_now - files_at_capture` when that's non-empty, else
    /// `files_now` capped at 5 (SPEC_FULL §4.D).
    pub fn record_successful_fix(
        &mut self,
        task_id: &str,
        files_now: &[String],
        edit_summary: &str,
    ) -> Result<(), StateError> {
        let Some(pos) = self.doc.pending.iter().position(|p| p.task_id == task_id) else {
            return Ok(());
        };
        let pending = self.doc.pending.remove(pos);

        let captured: std::collections::HashSet<&str> =
            pending.files_at_capture.iter().map(String::as_str).collect();
        let mut new_files: Vec<String> =
            files_now.iter().filter(|f| !captured.contains(f.as_str())).cloned().collect();
        if new_files.is_empty() {
            new_files = files_now.iter().take(5).cloned().collect();
        } else {
            new_files.truncate(5);
        }

        let now = Utc::now();
        let Some(pattern) = self.doc.patterns.get_mut(&pending.signature) else {
            return self.persist();
        };
        pattern.fix_success_count += 1;
        pattern.last_seen = now;
        pattern.fixes.push(FixRecord {
            files_changed: new_files,
            edit_summary: truncate_chars(edit_summary, 200),
            recorded_at: now,
        });
        if pattern.fixes.len() > MAX_FIXES_PER_PATTERN {
            pattern.fixes.remove(0);
        }

        self.persist()
    }

    /// Explicitly clear a pending entry without recording a fix (e.g. task
    /// abandoned, cancelled).
    pub fn clear_pending(&mut self, task_id: &str) -> Result<(), StateError> {
        self.doc.pending.retain(|p| p.task_id != task_id);
        self.persist()
    }

    pub fn find_fix_suggestions(&self, category: &str, message: &str) -> Option<&ErrorFixPattern> {
        let signature = generate_signature(category, message);
        self.doc.patterns.get(&signature)
    }

    /// Render a compact prompt-ready block: occurrence count, success rate,
    /// and up to 3 most recent fixes (SPEC_FULL §4.D).
    pub fn format_for_prompt(&self, category: &str, message: &str) -> Option<String> {
        let pattern = self.find_fix_suggestions(category, message)?;
        let success_rate = if pattern.occurrence_count == 0 {
            0.0
        } else {
            pattern.fix_success_count as f64 / pattern.occurrence_count as f64 * 100.0
        };
        let mut block = format!(
            "Known error pattern `{}` seen {} time(s), {:.0}% fixed.\n",
            pattern.signature, pattern.occurrence_count, success_rate
        );
        for fix in pattern.fixes.iter().rev().take(3) {
            block.push_str(&format!("- {} ({})\n", fix.edit_summary, fix.files_changed.join(", ")));
        }
        Some(block)
    }

    /// Drop patterns older than `max_age` with zero fixes and fewer than 5
    /// occurrences (SPEC_FULL §4.D).
    pub fn prune(&mut self, max_age: chrono::Duration) -> Result<usize, StateError> {
        let cutoff = Utc::now() - max_age;
        let before = self.doc.patterns.len();
        self.doc
            .patterns
            .retain(|_, p| !(p.last_seen < cutoff && p.fixes.is_empty() && p.occurrence_count < 5));
        let removed = before - self.doc.patterns.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn pending(&self) -> &[PendingError] {
        &self.doc.pending
    }

    fn persist(&mut self) -> Result<(), StateError> {
        self.doc.last_updated = Utc::now();
        atomic_write_json(&self.path, &self.doc)
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
