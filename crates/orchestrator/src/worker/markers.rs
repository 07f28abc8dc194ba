//! Agent marker protocol parsing (SPEC_FULL §6, §9).
//!
//! "Dynamic markers in text": the agent marker protocol is parsed from
//! free-form output and must tolerate interleaving with prose. Grounded on
//! the teacher corpus's `LazyLock<Regex>` idiom in `feedback::error_parser`
//! (there used for compiler-error classification; here applied to
//! line-level, case-insensitive marker extraction per SPEC_FULL §9's
//! explicit implementer guidance).

use regex::Regex;
use std::sync::LazyLock;

static TASK_ALREADY_COMPLETE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^.*TASK_ALREADY_COMPLETE:\s*(.+)$").expect("valid regex"));
static INVALID_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^.*INVALID_TARGET:\s*(.+)$").expect("valid regex"));
static NEEDS_DECOMPOSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^.*NEEDS_DECOMPOSITION:\s*(.+)$").expect("valid regex"));

/// A marker emitted by the agent in free-form text output (SPEC_FULL §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentMarker {
    TaskAlreadyComplete { reason: String },
    InvalidTarget { reason: String },
    NeedsDecomposition { reason: String },
}

impl AgentMarker {
    /// `NEEDS_DECOMPOSITION` reasons may be a semicolon-separated list of
    /// subtasks (SPEC_FULL §6).
    pub fn subtasks(&self) -> Vec<String> {
        match self {
            AgentMarker::NeedsDecomposition { reason } => reason
                .split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Scan `text` for every marker occurrence, preserving order of appearance.
/// Markers may be interleaved with ordinary prose on other lines.
pub fn parse_markers(text: &str) -> Vec<AgentMarker> {
    let mut hits: Vec<(usize, AgentMarker)> = Vec::new();

    for caps in TASK_ALREADY_COMPLETE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        hits.push((
            m.start(),
            AgentMarker::TaskAlreadyComplete { reason: caps[1].trim().to_string() },
        ));
    }
    for caps in INVALID_TARGET.captures_iter(text) {
        let m = caps.get(0).unwrap();
        hits.push((m.start(), AgentMarker::InvalidTarget { reason: caps[1].trim().to_string() }));
    }
    for caps in NEEDS_DECOMPOSITION.captures_iter(text) {
        let m = caps.get(0).unwrap();
        hits.push((
            m.start(),
            AgentMarker::NeedsDecomposition { reason: caps[1].trim().to_string() },
        ));
    }

    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, marker)| marker).collect()
}

/// The first marker in `text`, if any — the Worker only needs to know
/// whether *a* completion/decomposition/invalid-target marker fired this
/// attempt (SPEC_FULL §4.E step 3 "Stop gate").
pub fn first_marker(text: &str) -> Option<AgentMarker> {
    parse_markers(text).into_iter().next()
}
