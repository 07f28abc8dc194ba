//! The Error-Fix Pattern Store — deterministic error signatures and
//! recorded fix history, so recurring errors get suggested fixes
//! instead of being re-diagnosed from scratch (SPEC_FULL §4.D).
//!
//! Grounded on the teacher corpus's `feedback::error_parser` for the
//! `LazyLock<Regex>` normalization idiom and on `kernel::state`'s atomic
//! persistence primitives, reused directly rather than re-implemented.

mod model;
mod signature;
mod store;

pub use model::{
    ErrorFixPattern, ErrorFixPatternsDocument, FixRecord, PendingError,
    ERROR_FIX_PATTERNS_VERSION, MAX_FIXES_PER_PATTERN, MAX_PENDING_ENTRIES,
    MAX_SAMPLE_MESSAGE_CHARS,
};
pub use signature::{generate_signature, normalize};
pub use store::ErrorFixPatternStore;
