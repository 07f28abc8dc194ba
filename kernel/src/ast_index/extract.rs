//! Regex-based export/import extraction for TS/JS source files.
//!
//! Grounded on the teacher corpus's `feedback::error_parser` idiom (small,
//! named, `LazyLock`-held regexes doing structured extraction from source
//! text) generalized here from compiler-error classification to
//! import/export statement extraction — a substitution for the teacher's
//! `tree-sitter`-based Rust AST walker, which cannot produce the TS/JS
//! shaped export/import model this data model specifies (see DESIGN.md).

use super::model::{ExportKind, ExportedSymbol, ImportRecord};
use regex::Regex;
use std::sync::LazyLock;

static EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^export\s+(?:default\s+)?(?:declare\s+)?(?:async\s+)?(?P<kind>function\*?|class|interface|type|const|let|enum)\s+(?P<name>[A-Za-z_$][\w$]*)",
    )
    .expect("valid export declaration regex")
});

static IMPORT_STMT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^import\s+(?P<type_only>type\s+)?(?P<clause>[^;]+?)\s+from\s+['"](?P<specifier>[^'"]+)['"]"#,
    )
    .expect("valid import statement regex")
});

static NAMESPACE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\s+as\s+(?P<ns>[A-Za-z_$][\w$]*)$").expect("valid namespace clause regex"));

static DEFAULT_AND_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<default>[A-Za-z_$][\w$]*)\s*,\s*\{(?P<named>[^}]*)\}$")
        .expect("valid default+named clause regex")
});

static NAMED_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{(?P<named>[^}]*)\}$").expect("valid named-only clause regex"));

static DEFAULT_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<default>[A-Za-z_$][\w$]*)$").expect("valid default-only clause regex"));

/// Extract top-level exported declarations. Nested declarations (inside a
/// function/class body) are not matched since the pattern anchors to
/// line-start (`export` is never indented at module scope in formatted
/// source).
pub fn extract_exports(source: &str) -> Vec<ExportedSymbol> {
    EXPORT_DECL
        .captures_iter(source)
        .filter_map(|caps| {
            let kind = match &caps["kind"] {
                "function" | "function*" => ExportKind::Function,
                "class" => ExportKind::Class,
                "interface" => ExportKind::Interface,
                "type" => ExportKind::Type,
                "const" | "let" => ExportKind::Const,
                "enum" => ExportKind::Enum,
                _ => return None,
            };
            let whole = caps.get(0).expect("whole match always present");
            let source_line = source[..whole.start()].matches('\n').count() as u32 + 1;
            Some(ExportedSymbol {
                name: caps["name"].to_string(),
                kind,
                source_line,
            })
        })
        .collect()
}

/// Extract import statements. `resolved_path` is left `None` here; path
/// resolution against the rest of the index happens in [`super::index`].
pub fn extract_imports(source: &str) -> Vec<ImportRecord> {
    IMPORT_STMT
        .captures_iter(source)
        .map(|caps| {
            let type_only = caps.name("type_only").is_some();
            let clause = caps["clause"].trim();
            let specifier = caps["specifier"].to_string();

            let (default_import, namespace_import, named_imports) =
                if let Some(ns) = NAMESPACE_CLAUSE.captures(clause) {
                    (None, Some(ns["ns"].to_string()), Vec::new())
                } else if let Some(both) = DEFAULT_AND_NAMED.captures(clause) {
                    (Some(both["default"].to_string()), None, split_named(&both["named"]))
                } else if let Some(named) = NAMED_ONLY.captures(clause) {
                    (None, None, split_named(&named["named"]))
                } else if let Some(def) = DEFAULT_ONLY.captures(clause) {
                    (Some(def["default"].to_string()), None, Vec::new())
                } else {
                    (None, None, Vec::new())
                };

            ImportRecord {
                specifier,
                resolved_path: None,
                named_imports,
                default_import,
                namespace_import,
                type_only,
            }
        })
        .collect()
}

/// `{ a, b as c, type D }` -> local binding names, in declaration order.
fn split_named(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let entry = entry.strip_prefix("type ").unwrap_or(entry).trim();
            entry.rsplit("as").next().map(str::trim).unwrap_or(entry).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_export_kinds() {
        let src = "export function foo() {}\nexport class Bar {}\nexport interface Baz {}\nexport type Qux = string;\nexport const answer = 42;\nexport enum Color { Red }\n";
        let exports = extract_exports(src);
        assert_eq!(exports.len(), 6);
        assert_eq!(exports[0].name, "foo");
        assert_eq!(exports[0].kind, ExportKind::Function);
        assert_eq!(exports[1].kind, ExportKind::Class);
        assert_eq!(exports[4].kind, ExportKind::Const);
        assert_eq!(exports[5].kind, ExportKind::Enum);
    }

    #[test]
    fn ignores_non_exported_and_nested_declarations() {
        let src = "function helper() {}\nclass Internal {}\n";
        assert!(extract_exports(src).is_empty());
    }

    #[test]
    fn export_line_number_is_one_indexed() {
        let src = "// header\n\nexport const value = 1;\n";
        let exports = extract_exports(src);
        assert_eq!(exports[0].source_line, 3);
    }

    #[test]
    fn extracts_default_import() {
        let src = "import React from 'react';\n";
        let imports = extract_imports(src);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].default_import.as_deref(), Some("React"));
        assert_eq!(imports[0].specifier, "react");
        assert!(!imports[0].type_only);
    }

    #[test]
    fn extracts_named_imports() {
        let src = "import { useState, useEffect as fx } from 'react';\n";
        let imports = extract_imports(src);
        assert_eq!(imports[0].named_imports, vec!["useState", "fx"]);
    }

    #[test]
    fn extracts_namespace_import() {
        let src = "import * as path from 'path';\n";
        let imports = extract_imports(src);
        assert_eq!(imports[0].namespace_import.as_deref(), Some("path"));
    }

    #[test]
    fn extracts_type_only_import() {
        let src = "import type { Props } from './types';\n";
        let imports = extract_imports(src);
        assert!(imports[0].type_only);
        assert_eq!(imports[0].named_imports, vec!["Props"]);
    }

    #[test]
    fn extracts_default_and_named_together() {
        let src = "import Default, { a, b } from './mod';\n";
        let imports = extract_imports(src);
        assert_eq!(imports[0].default_import.as_deref(), Some("Default"));
        assert_eq!(imports[0].named_imports, vec!["a", "b"]);
    }
}
