//! Import specifier resolution against the set of indexed files.

use std::collections::BTreeSet;

/// Extensions tried, in order, when a specifier names a directory or an
/// extension-less path (SPEC_FULL §4.B "a small extension-search set").
const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

/// Resolve `specifier` as imported from `importer` against the set of
/// known repo-relative paths. Only relative/absolute specifiers
/// (`./`, `../`, `/`) are resolved; anything else is external and always
/// resolves to `None` (SPEC_FULL §4.B).
pub fn resolve_specifier(importer: &str, specifier: &str, known_files: &BTreeSet<String>) -> Option<String> {
    if !(specifier.starts_with('.') || specifier.starts_with('/')) {
        return None;
    }

    let base = if specifier.starts_with('/') {
        specifier.trim_start_matches('/').to_string()
    } else {
        let importer_dir = importer.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        join_and_normalize(importer_dir, specifier)
    };

    if known_files.contains(&base) {
        return Some(base);
    }
    for ext in EXTENSIONS {
        let candidate = format!("{base}{ext}");
        if known_files.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in EXTENSIONS {
        let candidate = format!("{base}/index{ext}");
        if known_files.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Join a directory and a relative specifier, collapsing `.`/`..` segments.
fn join_and_normalize(dir: &str, specifier: &str) -> String {
    let mut segments: Vec<&str> = if dir.is_empty() { Vec::new() } else { dir.split('/').collect() };
    for part in specifier.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_sibling_file_with_extension_search() {
        let known = files(&["src/auth/login.ts", "src/auth/session.ts"]);
        assert_eq!(
            resolve_specifier("src/auth/login.ts", "./session", &known),
            Some("src/auth/session.ts".to_string())
        );
    }

    #[test]
    fn resolves_parent_relative_specifier() {
        let known = files(&["src/util.ts", "src/auth/login.ts"]);
        assert_eq!(
            resolve_specifier("src/auth/login.ts", "../util", &known),
            Some("src/util.ts".to_string())
        );
    }

    #[test]
    fn resolves_directory_index() {
        let known = files(&["src/auth/index.ts"]);
        assert_eq!(
            resolve_specifier("src/main.ts", "./auth", &known),
            Some("src/auth/index.ts".to_string())
        );
    }

    #[test]
    fn external_specifier_is_unresolved() {
        let known = files(&["src/main.ts"]);
        assert_eq!(resolve_specifier("src/main.ts", "react", &known), None);
    }

    #[test]
    fn unresolvable_relative_specifier_is_none() {
        let known = files(&["src/main.ts"]);
        assert_eq!(resolve_specifier("src/main.ts", "./missing", &known), None);
    }
}
