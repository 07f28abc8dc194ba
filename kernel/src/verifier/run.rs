//! Check execution: subprocess spawn, per-check timeout, and reduction to
//! a [`VerificationResult`] (SPEC_FULL §4.A, §5).

use super::config::{CheckConfig, CheckKind, VerifierConfig};
use super::parsers::{parse_lint_output, parse_lint_warnings, parse_test_output, parse_typecheck_output};
use super::report::{dedup_issues, Issue, IssueCategory, VerificationResult};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("working directory does not exist: {0}")]
    MissingWorkingDir(String),
}

/// Runs the configured checks against a working directory.
///
/// Grounded on the teacher corpus's `verifier::pipeline::Verifier`: each
/// check spawns as a `tokio::process::Command` under a timeout, truncating
/// captured output rather than buffering it unbounded.
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Verifier { config }
    }

    /// Run every non-skipped check against `working_dir`. `base_commit`, if
    /// given, is the commit `filesChanged` is diffed against.
    pub async fn run(
        &self,
        working_dir: &Path,
        base_commit: Option<&str>,
    ) -> Result<VerificationResult, VerifierError> {
        if !working_dir.is_dir() {
            return Err(VerifierError::MissingWorkingDir(
                working_dir.display().to_string(),
            ));
        }

        let files_changed = self.files_changed(working_dir, base_commit).await;

        let mut all_issues = Vec::new();
        let mut feedback_parts = Vec::new();
        let mut has_warnings = false;
        let mut any_exec_failure = false;

        for check in &self.config.checks {
            if check.skip {
                tracing::debug!(check = %check.kind.as_str(), "verifier check skipped");
                continue;
            }
            let outcome = self.run_check(working_dir, check).await;
            match outcome {
                CheckOutcome::Issues(issues, warnings) => {
                    all_issues.extend(issues);
                    if !warnings.is_empty() {
                        has_warnings = true;
                        feedback_parts.push(format!(
                            "[{}] {} warning(s): {}",
                            check.kind.as_str(),
                            warnings.len(),
                            warnings.join("; ")
                        ));
                    }
                }
                CheckOutcome::Clean => {}
                CheckOutcome::ExecFailure(issue, tail) => {
                    any_exec_failure = true;
                    all_issues.push(issue);
                    feedback_parts.push(format!("[{}] {}", check.kind.as_str(), tail));
                }
            }
        }

        let issues = dedup_issues(all_issues);
        let passed = issues.is_empty();
        let feedback = if feedback_parts.is_empty() {
            if passed {
                "all checks passed".to_string()
            } else {
                render_feedback(&issues)
            }
        } else {
            feedback_parts.join("\n\n")
        };

        tracing::info!(
            passed,
            has_warnings,
            exec_failure = any_exec_failure,
            issue_count = issues.len(),
            files_changed = files_changed.len(),
            "verification run complete"
        );

        Ok(VerificationResult {
            passed,
            has_warnings,
            files_changed,
            issues,
            feedback,
            base_commit: base_commit.map(str::to_string),
        })
    }

    async fn run_check(&self, working_dir: &Path, check: &CheckConfig) -> CheckOutcome {
        let mut cmd = Command::new(&check.program);
        cmd.args(&check.args).current_dir(working_dir).kill_on_drop(true);

        match tokio::time::timeout(check.timeout, cmd.output()).await {
            Ok(Ok(output)) => self.reduce_output(check, &output),
            Ok(Err(err)) => CheckOutcome::ExecFailure(
                unknown_issue(check.kind, format!("failed to spawn {}: {err}", check.program)),
                self.truncate(format!("failed to spawn {}: {err}", check.program).as_bytes()),
            ),
            Err(_) => CheckOutcome::ExecFailure(
                unknown_issue(
                    check.kind,
                    format!(
                        "{} timed out after {}s",
                        check.kind.as_str(),
                        check.timeout.as_secs()
                    ),
                ),
                format!("{} timed out after {}s", check.kind.as_str(), check.timeout.as_secs()),
            ),
        }
    }

    fn reduce_output(&self, check: &CheckConfig, output: &std::process::Output) -> CheckOutcome {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}\n{stderr}");

        let warnings = match check.kind {
            CheckKind::Lint => parse_lint_warnings(&combined),
            _ => Vec::new(),
        };

        if output.status.success() {
            return if warnings.is_empty() {
                CheckOutcome::Clean
            } else {
                CheckOutcome::Issues(Vec::new(), warnings)
            };
        }

        let issues = match check.kind {
            CheckKind::Typecheck => parse_typecheck_output(&combined),
            CheckKind::Lint => parse_lint_output(&combined),
            CheckKind::Test => parse_test_output(&combined),
            CheckKind::Build => Vec::new(),
        };

        if issues.is_empty() && warnings.is_empty() {
            // Non-zero exit with nothing parseable: exec failure per SPEC_FULL
            // §4.A ("tool missing, non-zero without parseable output").
            let tail = self.truncate(stderr.as_bytes());
            CheckOutcome::ExecFailure(unknown_issue(check.kind, tail.clone()), tail)
        } else {
            CheckOutcome::Issues(issues, warnings)
        }
    }

    fn truncate(&self, bytes: &[u8]) -> String {
        let max = self.config.feedback_tail_bytes;
        let start = bytes.len().saturating_sub(max);
        String::from_utf8_lossy(&bytes[start..]).to_string()
    }

    async fn files_changed(&self, working_dir: &Path, base_commit: Option<&str>) -> Vec<String> {
        let Some(base) = base_commit else {
            return Vec::new();
        };
        let mut cmd = Command::new("git");
        cmd.args(["diff", "--name-only", base])
            .current_dir(working_dir)
            .kill_on_drop(true);

        match tokio::time::timeout(Duration::from_secs(30), cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::to_string)
                .filter(|l| !l.is_empty())
                .collect(),
            Ok(Ok(output)) => {
                tracing::warn!(
                    status = ?output.status.code(),
                    "git diff --name-only failed, reporting empty file list"
                );
                Vec::new()
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "failed to spawn git diff");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!("git diff --name-only timed out");
                Vec::new()
            }
        }
    }
}

fn unknown_issue(kind: CheckKind, message: impl Into<String>) -> Issue {
    let _ = kind;
    Issue {
        file: None,
        line: None,
        column: None,
        code: None,
        message: message.into(),
        category: IssueCategory::Unknown,
        suggestion: None,
    }
}

fn render_feedback(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| match (&i.file, i.line) {
            (Some(file), Some(line)) => format!("{file}:{line}: {}", i.message),
            (Some(file), None) => format!("{file}: {}", i.message),
            _ => i.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

enum CheckOutcome {
    Clean,
    /// Blocking issues plus any non-blocking lint warnings found alongside them.
    Issues(Vec<Issue>, Vec<String>),
    ExecFailure(Issue, String),
}
