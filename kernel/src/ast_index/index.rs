//! The AST Index: incremental build, persistence, and query surface
//! (SPEC_FULL §4.B).

use super::extract::{extract_exports, extract_imports};
use super::model::{AstIndexDocument, ExportedSymbol, FileRecord, RelevantFile, AST_INDEX_VERSION};
use super::relevance;
use super::resolve::resolve_specifier;
use crate::state::{atomic_write_json, tolerant_load_json, StateError};
use chrono::Utc;
use ignore::WalkBuilder;
use md5::{Digest, Md5};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

pub struct AstIndex {
    path: PathBuf,
    doc: AstIndexDocument,
}

impl AstIndex {
    pub fn open(state_dir: &Path) -> Self {
        let path = state_dir.join(crate::state::AST_INDEX_FILE);
        let doc: AstIndexDocument = tolerant_load_json(&path);
        AstIndex { path, doc }
    }

    /// Incrementally refresh the index against `repo_root`. If the on-disk
    /// index's version or recorded `gitCommit` does not match, a full
    /// rebuild is performed from an empty index instead (SPEC_FULL §4.B).
    pub fn update(&mut self, repo_root: &Path, git_commit: Option<&str>) -> Result<(), StateError> {
        if self.doc.version != AST_INDEX_VERSION || self.doc.git_commit.as_deref() != git_commit {
            tracing::info!("AST index version/commit mismatch, rebuilding from empty");
            self.doc = AstIndexDocument::default();
        }

        let candidates = enumerate_candidate_files(repo_root);
        let candidate_set: BTreeSet<String> = candidates.iter().cloned().collect();

        // Drop records for files that no longer exist.
        let stale: Vec<String> = self
            .doc
            .files
            .keys()
            .filter(|path| !candidate_set.contains(*path))
            .cloned()
            .collect();
        for path in stale {
            self.remove_file(&path);
        }

        for rel_path in &candidates {
            let abs_path = repo_root.join(rel_path);
            let source = match std::fs::read_to_string(&abs_path) {
                Ok(source) => source,
                Err(err) => {
                    tracing::warn!(path = %abs_path.display(), error = %err, "failed to read candidate file, skipping");
                    continue;
                }
            };
            let hash = content_hash(&source);
            if self.doc.files.get(rel_path).is_some_and(|r| r.md5 == hash) {
                continue;
            }
            self.reindex_file(rel_path, &source, hash, &candidate_set);
        }

        self.doc.git_commit = git_commit.map(str::to_string);
        self.persist()
    }

    fn reindex_file(&mut self, rel_path: &str, source: &str, hash: String, known_files: &BTreeSet<String>) {
        self.remove_file(rel_path);

        let exports = extract_exports(source);
        let mut imports = extract_imports(source);
        for import in &mut imports {
            import.resolved_path = resolve_specifier(rel_path, &import.specifier, known_files);
        }

        for export in &exports {
            self.doc
                .symbol_to_files
                .entry(export.name.clone())
                .or_default()
                .insert(rel_path.to_string());
        }
        for import in &imports {
            if let Some(resolved) = &import.resolved_path {
                self.doc
                    .imported_by
                    .entry(resolved.clone())
                    .or_default()
                    .insert(rel_path.to_string());
            }
        }

        self.doc.files.insert(
            rel_path.to_string(),
            FileRecord {
                path: rel_path.to_string(),
                md5: hash,
                exports,
                imports,
            },
        );
    }

    /// Remove a file's record and retract it from both reverse maps,
    /// keeping the invariant in SPEC_FULL §3/§8 ("removing a file or
    /// re-indexing it atomically updates both directions").
    fn remove_file(&mut self, rel_path: &str) {
        if let Some(record) = self.doc.files.remove(rel_path) {
            for export in &record.exports {
                if let Some(files) = self.doc.symbol_to_files.get_mut(&export.name) {
                    files.remove(rel_path);
                    if files.is_empty() {
                        self.doc.symbol_to_files.remove(&export.name);
                    }
                }
            }
            for import in &record.imports {
                if let Some(resolved) = &import.resolved_path {
                    if let Some(importers) = self.doc.imported_by.get_mut(resolved) {
                        importers.remove(rel_path);
                        if importers.is_empty() {
                            self.doc.imported_by.remove(resolved);
                        }
                    }
                }
            }
        }
        self.doc.imported_by.remove(rel_path);
    }

    pub fn find_files_defining(&self, symbol: &str) -> Vec<String> {
        self.doc
            .symbol_to_files
            .get(symbol)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn find_importers(&self, path: &str) -> Vec<String> {
        self.doc
            .imported_by
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Local imports only; unresolved (external) imports are filtered out.
    pub fn find_imports(&self, path: &str) -> Vec<String> {
        self.doc
            .files
            .get(path)
            .map(|record| record.imports.iter().filter_map(|i| i.resolved_path.clone()).collect())
            .unwrap_or_default()
    }

    pub fn search_symbols(&self, pattern: &str) -> Vec<ExportedSymbol> {
        let pattern = pattern.to_lowercase();
        let mut matches: Vec<ExportedSymbol> = self
            .doc
            .files
            .values()
            .flat_map(|r| r.exports.iter())
            .filter(|e| e.name.to_lowercase().contains(&pattern))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches
    }

    pub fn find_relevant_files(&self, objective: &str, max_results: usize) -> Vec<RelevantFile> {
        relevance::find_relevant_files(&self.doc, objective, max_results)
    }

    pub fn file_summary(&self, path: &str) -> Option<String> {
        self.doc.files.get(path).map(relevance::file_summary)
    }

    pub fn file_record(&self, path: &str) -> Option<&FileRecord> {
        self.doc.files.get(path)
    }

    pub fn document(&self) -> &AstIndexDocument {
        &self.doc
    }

    fn persist(&mut self) -> Result<(), StateError> {
        self.doc.last_updated = Utc::now();
        atomic_write_json(&self.path, &self.doc)
    }
}

fn content_hash(source: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Walk `repo_root` honoring `.gitignore`, restricted to TS/JS source
/// extensions, returning repo-relative forward-slashed paths.
fn enumerate_candidate_files(repo_root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    for entry in WalkBuilder::new(repo_root).hidden(false).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry during AST index walk");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(repo_root) else {
            continue;
        };
        files.push(rel.to_string_lossy().replace('\\', "/"));
    }
    files.sort();
    files
}
