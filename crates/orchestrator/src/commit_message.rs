//! Conventional-commit message construction from a completed task
//! (SPEC_FULL §6).

use undercity_kernel::capability_ledger::extract_tokens;

const GENERIC_TOP_LEVEL_DIRS: &[&str] = &["src", "lib", "test", "tests"];
const MAX_SUBJECT_LEN: usize = 72;

/// Derive the conventional-commit type from the objective's keywords, in
/// the fixed priority order SPEC_FULL §6 specifies. First match wins.
///
/// Matches whole word-tokens (the same tokenizer the Capability Ledger uses
/// to match action keywords), not raw substrings — otherwise "Fix the latest
/// bug" would match "test" inside "latest" and misclassify as `test`.
pub fn derive_type(objective: &str) -> &'static str {
    let tokens: std::collections::HashSet<String> = extract_tokens(objective).into_iter().collect();
    let has = |words: &[&str]| words.iter().any(|w| tokens.contains(*w));

    if has(&["research", "investigate", "explore"]) {
        "research"
    } else if has(&["test", "tests", "testing", "spec"]) {
        "test"
    } else if has(&["doc", "docs", "document", "documentation"]) {
        "docs"
    } else if has(&["perf", "performance", "optimize", "optimization", "speed", "speedup"]) {
        "perf"
    } else if has(&["add", "implement", "create", "feature", "introduce"]) {
        "feat"
    } else if has(&["fix", "bug", "resolve", "repair"]) {
        "fix"
    } else if has(&["refactor", "restructure", "reorganize", "rename", "extract"]) {
        "refactor"
    } else if has(&["doc", "docs"]) {
        // Keyword fallback, as literally enumerated in the priority list.
        "docs"
    } else if has(&["style", "format", "lint"]) {
        "style"
    } else {
        "chore"
    }
}

/// Derive the commit scope from the set of files a task modified
/// (SPEC_FULL §6).
pub fn derive_scope(files: &[String]) -> Option<String> {
    match files.len() {
        0 => None,
        1 => file_basename_without_ext(&files[0]),
        _ => {
            let dirs: Vec<&str> = files.iter().filter_map(|f| parent_dir(f)).collect();
            if !dirs.is_empty() && dirs.iter().all(|d| *d == dirs[0]) {
                let dir = dirs[0];
                if !GENERIC_TOP_LEVEL_DIRS.contains(&dir) {
                    return Some(dir.to_string());
                }
            }
            common_basename_prefix(files)
        }
    }
}

fn file_basename_without_ext(path: &str) -> Option<String> {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let stem = basename.split('.').next().unwrap_or(basename);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn parent_dir(path: &str) -> Option<&str> {
    let (dir, _) = path.rsplit_once('/')?;
    dir.rsplit('/').next()
}

fn common_basename_prefix(files: &[String]) -> Option<String> {
    let basenames: Vec<&str> = files.iter().map(|f| f.rsplit('/').next().unwrap_or(f)).collect();
    let first = basenames.first()?;
    let mut prefix_len = first.len();
    for name in &basenames[1..] {
        let common = first
            .chars()
            .zip(name.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix_len = prefix_len.min(common);
    }
    let prefix: String = first.chars().take(prefix_len).collect();
    if prefix.len() >= 3 {
        Some(prefix)
    } else {
        None
    }
}

/// Build the commit description: trim, strip leading bracket prefixes
/// (e.g. `[WIP] `), capitalize the first letter, truncate with ellipsis so
/// the whole subject line stays within [`MAX_SUBJECT_LEN`].
fn build_description(objective: &str, prefix_len: usize) -> String {
    let trimmed = objective.trim();
    let stripped = strip_bracket_prefix(trimmed);
    let capitalized = capitalize_first(stripped);

    let budget = MAX_SUBJECT_LEN.saturating_sub(prefix_len);
    if capitalized.chars().count() <= budget {
        capitalized
    } else {
        let ellipsis = "...";
        let keep = budget.saturating_sub(ellipsis.len());
        let mut truncated: String = capitalized.chars().take(keep).collect();
        truncated.push_str(ellipsis);
        truncated
    }
}

fn strip_bracket_prefix(s: &str) -> &str {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[end + 1..].trim_start();
        }
    }
    s
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Build the full conventional-commit subject line: `type(scope): Description`.
pub fn build_subject(objective: &str, modified_files: &[String]) -> String {
    let commit_type = derive_type(objective);
    let scope = derive_scope(modified_files);
    let header = match &scope {
        Some(scope) => format!("{commit_type}({scope}): "),
        None => format!("{commit_type}: "),
    };
    let description = build_description(objective, header.chars().count());
    format!("{header}{description}")
}
