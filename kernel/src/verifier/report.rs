//! Structured verification output (SPEC_FULL §4.A).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Category of a verification issue. `Unknown` covers exec failures (tool
/// missing, non-zero exit with no parseable output) and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Typecheck,
    Lint,
    Test,
    Build,
    Spell,
    Unknown,
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueCategory::Typecheck => "typecheck",
            IssueCategory::Lint => "lint",
            IssueCategory::Test => "test",
            IssueCategory::Build => "build",
            IssueCategory::Spell => "spell",
            IssueCategory::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One structured issue extracted from a check's native output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    pub category: IssueCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    /// Dedup key: same (file, line, code) collapses, per SPEC_FULL §4.A.
    fn dedup_key(&self) -> (Option<String>, Option<u32>, Option<String>) {
        (self.file.clone(), self.line, self.code.clone())
    }
}

/// Collapse duplicate issues sharing (file, line, code), keeping the first
/// occurrence's message.
pub fn dedup_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(issues.len());
    for issue in issues {
        let key = issue.dedup_key();
        if seen.insert(key) {
            out.push(issue);
        }
    }
    out
}

/// The Verifier's top-level result (SPEC_FULL §4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub has_warnings: bool,
    pub files_changed: Vec<String>,
    pub issues: Vec<Issue>,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_commit: Option<String>,
}

impl VerificationResult {
    pub fn unique_categories(&self) -> Vec<IssueCategory> {
        let mut cats: Vec<IssueCategory> = self
            .issues
            .iter()
            .map(|i| i.category)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        cats.sort_by_key(|c| c.to_string());
        cats
    }

    pub fn has_category(&self, category: IssueCategory) -> bool {
        self.issues.iter().any(|i| i.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(file: &str, line: u32, code: &str) -> Issue {
        Issue {
            file: Some(file.to_string()),
            line: Some(line),
            column: Some(1),
            code: Some(code.to_string()),
            message: "boom".to_string(),
            category: IssueCategory::Typecheck,
            suggestion: None,
        }
    }

    #[test]
    fn dedup_collapses_same_file_line_code() {
        let issues = vec![issue("a.ts", 1, "TS2322"), issue("a.ts", 1, "TS2322")];
        assert_eq!(dedup_issues(issues).len(), 1);
    }

    #[test]
    fn dedup_keeps_distinct_lines() {
        let issues = vec![issue("a.ts", 1, "TS2322"), issue("a.ts", 2, "TS2322")];
        assert_eq!(dedup_issues(issues).len(), 2);
    }
}
