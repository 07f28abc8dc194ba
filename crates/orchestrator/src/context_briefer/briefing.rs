//! Assembling the size-bounded context bundle a Worker hands to the agent
//! at the start of each attempt (SPEC_FULL §4.J).
//!
//! Grounded on the teacher corpus's `context_packer::packer` for the
//! "assemble a bounded bundle from several sources" composition style,
//! adapted from its token-budgeted `WorkPacket` to this domain's
//! `Briefing` shape (AST-indexed files rather than span windows).

use super::markdown::{parse_sections, sections_matching};
use super::truncate::smart_truncate;
use std::sync::LazyLock;
use undercity_kernel::{AstIndex, ErrorFixPatternStore, ExportKind};

const SCOUT_BOUND: usize = 400;
const PLANNER_BOUND: usize = 10_000;
const BUILDER_BOUND: usize = 5_000;
const REVIEWER_BOUND: usize = 3_000;
const BUILDER_EXCERPT_FOR_REVIEWER: usize = 800;

static NEW_FILE_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)^\(new file\)\s+in\s+([^,]+),").expect("valid new-file regex"));

/// The bundle handed to the agent at the start of an attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Briefing {
    pub objective: String,
    pub target_files: Vec<String>,
    pub type_definitions: Vec<String>,
    pub function_signatures: Vec<String>,
    pub related_patterns: Vec<String>,
    pub constraints: Vec<String>,
    pub briefing_doc: String,
}

/// Which agent role a role-specific context slice is being built for
/// (SPEC_FULL §4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Scout,
    Planner,
    Builder,
    Reviewer,
}

pub struct ContextBriefer;

impl ContextBriefer {
    /// Build the core briefing bundle for `objective` against `ast_index`,
    /// optionally enriched with a known error-fix hint from `fix_store`.
    pub fn brief(
        objective: &str,
        ast_index: &AstIndex,
        fix_store: Option<&ErrorFixPatternStore>,
        known_error: Option<(&str, &str)>,
        max_results: usize,
    ) -> Briefing {
        if let Some(target_path) = detect_new_file_objective(objective) {
            return Briefing {
                objective: objective.to_string(),
                target_files: Vec::new(),
                type_definitions: Vec::new(),
                function_signatures: Vec::new(),
                related_patterns: Vec::new(),
                constraints: vec![format!("CREATE NEW FILE: {target_path}")],
                briefing_doc: format!("Create a new file at `{target_path}` per the objective below.\n\n{objective}"),
            };
        }

        let relevant = ast_index.find_relevant_files(objective, max_results);
        let mut constraints = Vec::new();
        let mut type_definitions = Vec::new();
        let mut function_signatures = Vec::new();
        let mut target_files = Vec::new();
        let mut doc = String::new();
        doc.push_str(&format!("# Objective\n{objective}\n\n"));

        if !relevant.is_empty() {
            let files: Vec<&str> = relevant.iter().map(|r| r.file.as_str()).collect();
            constraints.push(format!("SCOPE: {}", files.join(", ")));
            doc.push_str("## Relevant files\n");
            for r in &relevant {
                target_files.push(r.file.clone());
                if let Some(summary) = ast_index.file_summary(&r.file) {
                    doc.push_str(&format!("- `{}` (score {}): {}\n", r.file, r.score, summary));
                }
                if let Some(record) = ast_index.file_record(&r.file) {
                    for export in &record.exports {
                        match export.kind {
                            ExportKind::Interface | ExportKind::Type | ExportKind::Enum => {
                                type_definitions.push(format!("{} ({})", export.name, r.file));
                            }
                            ExportKind::Function => {
                                function_signatures.push(format!("{}(...) — {}", export.name, r.file));
                            }
                            ExportKind::Class | ExportKind::Const => {}
                        }
                    }
                }
            }
            doc.push('\n');
        }

        let related_patterns: Vec<String> = match (fix_store, known_error) {
            (Some(store), Some((category, message))) => store
                .format_for_prompt(category, message)
                .map(|block| vec![block])
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        if !related_patterns.is_empty() {
            doc.push_str("## Known fix patterns\n");
            for pattern in &related_patterns {
                doc.push_str(pattern);
            }
            doc.push('\n');
        }

        Briefing {
            objective: objective.to_string(),
            target_files,
            type_definitions,
            function_signatures,
            related_patterns,
            constraints,
            briefing_doc: doc,
        }
    }

    /// Extract the role-specific subset of a markdown plan (SPEC_FULL §4.J).
    pub fn role_context(role: AgentRole, objective: &str, plan_markdown: Option<&str>, builder_output: Option<&str>) -> String {
        match role {
            AgentRole::Scout => smart_truncate(objective, SCOUT_BOUND),
            AgentRole::Planner => {
                let plan = plan_markdown.unwrap_or_default();
                smart_truncate(plan, PLANNER_BOUND)
            }
            AgentRole::Builder => {
                let plan = plan_markdown.unwrap_or_default();
                let sections = parse_sections(plan);
                let prioritized = sections_matching(&sections, &["Implementation Steps", "Files to Modify"]);
                let text = if prioritized.is_empty() {
                    plan.to_string()
                } else {
                    prioritized.iter().map(|s| format!("## {}\n{}\n", s.heading, s.body)).collect::<Vec<_>>().join("\n")
                };
                smart_truncate(&text, BUILDER_BOUND)
            }
            AgentRole::Reviewer => {
                let plan = plan_markdown.unwrap_or_default();
                let sections = parse_sections(plan);
                let prioritized = sections_matching(&sections, &["Test Requirements", "Security Considerations"]);
                let mut text = if prioritized.is_empty() {
                    String::new()
                } else {
                    prioritized.iter().map(|s| format!("## {}\n{}\n", s.heading, s.body)).collect::<Vec<_>>().join("\n")
                };
                if let Some(builder) = builder_output {
                    text.push_str("\n## Builder output\n");
                    text.push_str(&smart_truncate(builder, BUILDER_EXCERPT_FOR_REVIEWER));
                }
                smart_truncate(&text, REVIEWER_BOUND)
            }
        }
    }
}

fn detect_new_file_objective(objective: &str) -> Option<String> {
    NEW_FILE_PATTERN.captures(objective).map(|c| c[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_objective_still_returns_a_valid_briefing() {
        let dir = tempfile::tempdir().unwrap();
        let ast_index = AstIndex::open(dir.path());
        let briefing = ContextBriefer::brief("", &ast_index, None, None, 5);
        assert_eq!(briefing.objective, "");
        assert!(!briefing.briefing_doc.is_empty());
    }

    #[test]
    fn new_file_objective_yields_create_constraint_and_no_targets() {
        let dir = tempfile::tempdir().unwrap();
        let ast_index = AstIndex::open(dir.path());
        let briefing = ContextBriefer::brief(
            "(new file) In src/auth/session.ts, add a session store",
            &ast_index,
            None,
            None,
            5,
        );
        assert!(briefing.target_files.is_empty());
        assert_eq!(briefing.constraints, vec!["CREATE NEW FILE: src/auth/session.ts".to_string()]);
    }

    #[test]
    fn scope_constraint_lists_relevant_files() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join(".undercity");
        let repo = dir.path().join("repo");
        fs::create_dir_all(repo.join("src")).unwrap();
        fs::write(repo.join("src/auth.ts"), "export function login() {}\n").unwrap();
        let mut ast_index = AstIndex::open(&state_dir);
        ast_index.update(&repo, None).unwrap();

        let briefing = ContextBriefer::brief("fix the login function", &ast_index, None, None, 5);
        assert!(briefing.target_files.contains(&"src/auth.ts".to_string()));
        assert!(briefing.constraints.iter().any(|c| c.starts_with("SCOPE:")));
    }

    #[test]
    fn scout_role_truncates_objective_to_small_bound() {
        let long_objective = "x".repeat(1000);
        let context = ContextBriefer::role_context(AgentRole::Scout, &long_objective, None, None);
        assert!(context.len() <= SCOUT_BOUND + 20);
    }

    #[test]
    fn builder_role_prioritizes_implementation_steps_section() {
        let plan = "# Overview\nsome prose\n# Implementation Steps\ndo the work\n# Unrelated\nskip this";
        let context = ContextBriefer::role_context(AgentRole::Builder, "obj", Some(plan), None);
        assert!(context.contains("do the work"));
        assert!(!context.contains("skip this"));
    }
}
