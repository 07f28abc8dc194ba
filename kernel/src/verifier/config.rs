//! Verifier configuration: which checks to run, their commands, and timeouts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The four check kinds SPEC_FULL §4.A names explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Typecheck,
    Lint,
    Test,
    Build,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::Typecheck => "typecheck",
            CheckKind::Lint => "lint",
            CheckKind::Test => "test",
            CheckKind::Build => "build",
        }
    }
}

/// One configured check: a program + args to run, an optional skip flag,
/// and a per-check timeout (SPEC_FULL §4.A, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub kind: CheckKind,
    pub program: String,
    pub args: Vec<String>,
    pub skip: bool,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl CheckConfig {
    pub fn new(kind: CheckKind, program: impl Into<String>, args: Vec<String>) -> Self {
        CheckConfig {
            kind,
            program: program.into(),
            args,
            skip: false,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The set of checks a [`super::Verifier`] runs, in order.
///
/// Defaults assume a TS/JS-shaped repository (consistent with the AST
/// Index's export/import model, SPEC_FULL §3): `tsc --noEmit` for
/// typecheck, `eslint .` for lint, `npm test` for test, `npm run build`
/// for build. Any tunable named explicitly in SPEC_FULL is a field here
/// with a `Default` impl carrying the specified default (§2.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub checks: Vec<CheckConfig>,
    /// Bytes of raw output tail preserved on an unparseable exec failure.
    pub feedback_tail_bytes: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            checks: vec![
                CheckConfig::new(CheckKind::Typecheck, "npx", vec!["tsc".into(), "--noEmit".into()]),
                CheckConfig::new(CheckKind::Lint, "npx", vec!["eslint".into(), ".".into()]),
                CheckConfig::new(CheckKind::Build, "npm", vec!["run".into(), "build".into()]),
                CheckConfig::new(CheckKind::Test, "npm", vec!["test".into(), "--".into(), "--ci".into()]),
            ],
            feedback_tail_bytes: 2048,
        }
    }
}

impl VerifierConfig {
    pub fn skip(mut self, kind: CheckKind) -> Self {
        for check in self.checks.iter_mut().filter(|c| c.kind == kind) {
            check.skip = true;
        }
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
