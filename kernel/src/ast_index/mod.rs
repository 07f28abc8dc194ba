//! The AST Index — persistent per-file symbol/import map with
//! content-hash invalidation (SPEC_FULL §4.B).
//!
//! Grounded on the teacher corpus's `context_packer::ast_index` for the
//! index shape (per-file symbol records, reverse maps) and on
//! `feedback::error_parser`'s `LazyLock<Regex>` idiom for the extraction
//! itself — substituted for the teacher's `tree-sitter`-based Rust walker,
//! which cannot produce this data model's TS/JS-shaped export/import
//! vocabulary (see DESIGN.md).

mod extract;
mod index;
mod model;
mod relevance;
mod resolve;

pub use index::AstIndex;
pub use model::{
    AstIndexDocument, ExportKind, ExportedSymbol, FileRecord, ImportRecord, RelevantFile,
    AST_INDEX_VERSION,
};
pub use relevance::relevance_keywords;
