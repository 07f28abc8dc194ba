//! Native-output parsers for each check kind (SPEC_FULL §4.A).
//!
//! Grounded on the teacher corpus's `feedback::error_parser` idiom: small,
//! named, `LazyLock`-held regexes doing structured extraction from
//! free-form compiler/tool text rather than a real parser.

use super::report::{Issue, IssueCategory};
use regex::Regex;
use std::sync::LazyLock;

/// `path(line,col): error CODE: message` — the type checker's native format.
static TYPECHECK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<file>[^\s(][^(\n]*)\((?P<line>\d+),(?P<col>\d+)\):\s*error\s+(?P<code>[A-Za-z0-9]+):\s*(?P<message>.+)$")
        .expect("valid typecheck regex")
});

/// `path:line:col rule-id message` — the linter's native format.
static LINT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<file>[^\s:][^:\n]*):(?P<line>\d+):(?P<col>\d+)\s+(?P<severity>error|warning)\s+(?P<rule>[\w./-]+)\s+(?P<message>.+)$")
        .expect("valid lint regex")
});

/// Standard test-framework failure markers: `FAIL <file>` headers and
/// `● <describe> > <it>` / `✕ <name>` assertion lines.
static TEST_FAIL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^FAIL\s+(?P<file>\S+)").expect("valid test header regex"));
static TEST_ASSERTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:●|✕)\s*(?P<name>.+)$").expect("valid test assertion regex")
});

/// Parse the type checker's native output into structured issues.
pub fn parse_typecheck_output(output: &str) -> Vec<Issue> {
    TYPECHECK_LINE
        .captures_iter(output)
        .map(|caps| Issue {
            file: Some(caps["file"].trim().to_string()),
            line: caps["line"].parse().ok(),
            column: caps["col"].parse().ok(),
            code: Some(caps["code"].to_string()),
            message: caps["message"].trim().to_string(),
            category: IssueCategory::Typecheck,
            suggestion: None,
        })
        .collect()
}

/// Parse the linter's native output into structured issues. Only
/// `error`-severity lines become blocking [`Issue`]s; `warning`-severity
/// lines are surfaced separately via [`parse_lint_warnings`] so they can
/// set `hasWarnings` without flipping `passed` (SPEC_FULL §4.A).
pub fn parse_lint_output(output: &str) -> Vec<Issue> {
    LINT_LINE
        .captures_iter(output)
        .filter(|caps| &caps["severity"] == "error")
        .map(|caps| Issue {
            file: Some(caps["file"].trim().to_string()),
            line: caps["line"].parse().ok(),
            column: caps["col"].parse().ok(),
            code: Some(caps["rule"].to_string()),
            message: caps["message"].trim().to_string(),
            category: IssueCategory::Lint,
            suggestion: None,
        })
        .collect()
}

/// Non-blocking `warning`-severity lint lines, rendered as short
/// `rule: message` strings for `VerificationResult::feedback`.
pub fn parse_lint_warnings(output: &str) -> Vec<String> {
    LINT_LINE
        .captures_iter(output)
        .filter(|caps| &caps["severity"] == "warning")
        .map(|caps| format!("{}: {}", &caps["rule"], caps["message"].trim()))
        .collect()
}

/// Parse standard test-framework failure output into structured issues.
///
/// One issue per `FAIL <file>` block, carrying the assertion names found
/// before the next `FAIL` header (or end of output) in its message.
pub fn parse_test_output(output: &str) -> Vec<Issue> {
    let headers: Vec<(usize, &str)> = TEST_FAIL_HEADER
        .captures_iter(output)
        .map(|caps| {
            let m = caps.get(0).expect("whole match always present");
            (m.start(), caps.name("file").expect("file group").as_str())
        })
        .collect();

    let mut issues = Vec::with_capacity(headers.len());
    for (idx, &(start, file)) in headers.iter().enumerate() {
        let end = headers.get(idx + 1).map(|&(s, _)| s).unwrap_or(output.len());
        let block = &output[start..end];
        let assertions: Vec<String> = TEST_ASSERTION
            .captures_iter(block)
            .map(|c| c["name"].trim().to_string())
            .collect();
        let message = if assertions.is_empty() {
            format!("{file} failed")
        } else {
            assertions.join("; ")
        };
        issues.push(Issue {
            file: Some(file.to_string()),
            line: None,
            column: None,
            code: None,
            message,
            category: IssueCategory::Test,
            suggestion: None,
        });
    }
    issues
}
