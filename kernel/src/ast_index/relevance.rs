//! `find-relevant-files` scoring and file-summary generation (SPEC_FULL §4.B).

use super::model::{AstIndexDocument, ExportKind, FileRecord, RelevantFile};
use crate::capability_ledger::{extract_tokens, ACTION_VOCABULARY};

const EXACT_SYMBOL_MATCH: i32 = 10;
const PARTIAL_SYMBOL_MATCH: i32 = 5;
const FILENAME_MATCH: i32 = 3;
const IMPORTER_BONUS: i32 = 2;
const IMPORT_BONUS: i32 = 1;
const RELEVANCE_THRESHOLD_FOR_GRAPH_BONUS: i32 = 5;
const MAX_IMPORTER_BONUSES: usize = 3;
const MAX_IMPORT_BONUSES: usize = 3;

/// Keywords extracted from an objective for relevance scoring: the general
/// token extraction, minus the closed action vocabulary (those verbs are the
/// Capability Ledger's concern, not a file-relevance signal).
pub fn relevance_keywords(objective: &str) -> Vec<String> {
    extract_tokens(objective)
        .into_iter()
        .filter(|t| !ACTION_VOCABULARY.contains(&t.as_str()))
        .collect()
}

pub fn find_relevant_files(doc: &AstIndexDocument, objective: &str, max_results: usize) -> Vec<RelevantFile> {
    let keywords = relevance_keywords(objective);
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<RelevantFile> = doc
        .files
        .values()
        .filter_map(|record| score_file(record, &keywords))
        .collect();

    for i in 0..scored.len() {
        if scored[i].score < RELEVANCE_THRESHOLD_FOR_GRAPH_BONUS {
            continue;
        }
        let file = scored[i].file.clone();
        let importers: Vec<String> = doc
            .imported_by
            .get(&file)
            .map(|set| set.iter().take(MAX_IMPORTER_BONUSES).cloned().collect())
            .unwrap_or_default();
        let imports: Vec<String> = doc
            .files
            .get(&file)
            .map(|record| {
                record
                    .imports
                    .iter()
                    .filter_map(|imp| imp.resolved_path.clone())
                    .take(MAX_IMPORT_BONUSES)
                    .collect()
            })
            .unwrap_or_default();
        scored[i].score += importers.len() as i32 * IMPORTER_BONUS;
        scored[i].score += imports.len() as i32 * IMPORT_BONUS;
        if !importers.is_empty() {
            scored[i]
                .reasons
                .push(format!("imported by {} file(s)", importers.len()));
        }
        if !imports.is_empty() {
            scored[i].reasons.push(format!("imports {} local file(s)", imports.len()));
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.reasons.len().cmp(&a.reasons.len()))
            .then_with(|| a.file.cmp(&b.file))
    });
    scored.truncate(max_results);
    scored
}

fn score_file(record: &FileRecord, keywords: &[String]) -> Option<RelevantFile> {
    let mut score = 0i32;
    let mut reasons = Vec::new();
    let filename_lower = record.path.to_lowercase();

    for keyword in keywords {
        if record.exports.iter().any(|e| e.name.to_lowercase() == *keyword) {
            score += EXACT_SYMBOL_MATCH;
            reasons.push(format!("exact symbol match: {keyword}"));
        } else if record.exports.iter().any(|e| e.name.to_lowercase().contains(keyword.as_str())) {
            score += PARTIAL_SYMBOL_MATCH;
            reasons.push(format!("partial symbol match: {keyword}"));
        }
        if filename_lower.contains(keyword.as_str()) {
            score += FILENAME_MATCH;
            reasons.push(format!("filename contains: {keyword}"));
        }
    }

    if score > 0 {
        Some(RelevantFile {
            file: record.path.clone(),
            score,
            reasons,
        })
    } else {
        None
    }
}

/// A deterministic one-line summary of a file's exports, grouped by kind in
/// the order classes, functions, interface/type, constants, with overflow
/// suffix `(+N)`, truncated to 120 chars (SPEC_FULL §4.B).
pub fn file_summary(record: &FileRecord) -> String {
    if record.exports.is_empty() {
        return if record.imports.len() >= 3 {
            "Orchestration module".to_string()
        } else {
            "Internal module".to_string()
        };
    }

    let mut parts = Vec::new();
    for (label, kind) in [
        ("classes", &[ExportKind::Class][..]),
        ("functions", &[ExportKind::Function]),
        ("types", &[ExportKind::Interface, ExportKind::Type, ExportKind::Enum]),
        ("constants", &[ExportKind::Const]),
    ] {
        let names: Vec<&str> = record
            .exports
            .iter()
            .filter(|e| kind.contains(&e.kind))
            .map(|e| e.name.as_str())
            .collect();
        if names.is_empty() {
            continue;
        }
        const SHOWN: usize = 3;
        let shown: Vec<&str> = names.iter().take(SHOWN).copied().collect();
        let overflow = names.len().saturating_sub(SHOWN);
        let suffix = if overflow > 0 { format!(" (+{overflow})") } else { String::new() };
        parts.push(format!("{label}: {}{}", shown.join(", "), suffix));
    }

    let summary = parts.join("; ");
    truncate_summary(&summary, 120)
}

fn truncate_summary(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{truncated}\u{2026}")
    }
}
