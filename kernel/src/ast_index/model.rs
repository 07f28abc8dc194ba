//! The persisted AST Index document shape (SPEC_FULL §3, §6).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const AST_INDEX_VERSION: u32 = 1;

/// `ast-index.json`. Index version and the git HEAD commit at last full
/// build are carried alongside the per-file records and reverse maps; a
/// mismatch of either triggers a rebuild (SPEC_FULL §4.B).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AstIndexDocument {
    pub version: u32,
    #[serde(rename = "gitCommit", skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    pub files: BTreeMap<String, FileRecord>,
    #[serde(rename = "symbolToFiles", default)]
    pub symbol_to_files: BTreeMap<String, BTreeSet<String>>,
    #[serde(rename = "importedBy", default)]
    pub imported_by: BTreeMap<String, BTreeSet<String>>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Default for AstIndexDocument {
    fn default() -> Self {
        AstIndexDocument {
            version: AST_INDEX_VERSION,
            git_commit: None,
            files: BTreeMap::new(),
            symbol_to_files: BTreeMap::new(),
            imported_by: BTreeMap::new(),
            last_updated: chrono::DateTime::UNIX_EPOCH,
        }
    }
}

/// One file's record: content hash plus its exported symbols and imports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub path: String,
    pub md5: String,
    pub exports: Vec<ExportedSymbol>,
    pub imports: Vec<ImportRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: ExportKind,
    #[serde(rename = "sourceLine")]
    pub source_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Function,
    Class,
    Interface,
    Type,
    Const,
    Enum,
}

impl ExportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportKind::Function => "function",
            ExportKind::Class => "class",
            ExportKind::Interface => "interface",
            ExportKind::Type => "type",
            ExportKind::Const => "const",
            ExportKind::Enum => "enum",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRecord {
    pub specifier: String,
    #[serde(rename = "resolvedPath")]
    pub resolved_path: Option<String>,
    #[serde(rename = "namedImports", default)]
    pub named_imports: Vec<String>,
    #[serde(rename = "defaultImport", skip_serializing_if = "Option::is_none")]
    pub default_import: Option<String>,
    #[serde(rename = "namespaceImport", skip_serializing_if = "Option::is_none")]
    pub namespace_import: Option<String>,
    #[serde(rename = "typeOnly", default)]
    pub type_only: bool,
}

/// A `find-relevant-files` hit: the file, its accumulated score, and the
/// reasons that contributed to it (for display/debugging, SPEC_FULL §4.B).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelevantFile {
    pub file: String,
    pub score: i32,
    pub reasons: Vec<String>,
}
