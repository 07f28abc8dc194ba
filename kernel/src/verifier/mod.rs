//! The Verifier — runs typecheck/lint/test/build gates in a working
//! directory and reduces their native output to structured [`Issue`]
//! records (SPEC_FULL §4.A).
//!
//! Grounded on the teacher corpus's `verifier::pipeline::Verifier` (gate
//! sequencing, `tokio::process::Command` + timeout idiom, stderr
//! truncation) and `verifier::report` (issue/report shape), generalized
//! from the teacher's fixed cargo-gate pipeline to the configurable
//! typecheck/lint/test/build checks this domain's data model names.

mod config;
mod parsers;
mod report;
mod run;

pub use config::{CheckConfig, CheckKind, VerifierConfig};
pub use parsers::{parse_lint_output, parse_lint_warnings, parse_test_output, parse_typecheck_output};
pub use report::{Issue, IssueCategory, VerificationResult};
pub use run::{Verifier, VerifierError};
