//! Deterministic error-signature generation (SPEC_FULL §4.D).
//!
//! Grounded on the teacher corpus's `feedback::error_parser` idiom: small,
//! named, `LazyLock`-held regexes doing structured text normalization.

use md5::{Digest, Md5};
use regex::Regex;
use std::sync::LazyLock;

static PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:[./]|[A-Za-z]:\\)?(?:[\w.-]+[/\\])+[\w.-]+").expect("valid path regex"));
static LINE_KEYWORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bline\s+\d+\b").expect("valid line-keyword regex"));
static POSITION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+:\d+\b").expect("valid position regex"));
static QUOTED_LITERAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("valid quoted-literal regex"));
static HEX_ADDRESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("valid hex-address regex"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Normalize a raw error message into the stable form a signature is hashed
/// from: lowercase, paths/positions/literals/addresses replaced with fixed
/// placeholders, whitespace collapsed (SPEC_FULL §4.D steps 1-6).
///
/// Placeholders are lowercase (rather than the spec prose's literal `FILE`)
/// so that `normalize` is an idempotent fixed point once a message has
/// already been lowercased — required by the `normalize(normalize(m)) ==
/// normalize(m)` round-trip law in SPEC_FULL §8.
pub fn normalize(message: &str) -> String {
    let lower = message.to_lowercase();
    let no_paths = PATH_PATTERN.replace_all(&lower, "file");
    let no_line_kw = LINE_KEYWORD_PATTERN.replace_all(&no_paths, "line");
    let no_positions = POSITION_PATTERN.replace_all(&no_line_kw, "pos");
    let no_literals = QUOTED_LITERAL_PATTERN.replace_all(&no_positions, "lit");
    let no_addresses = HEX_ADDRESS_PATTERN.replace_all(&no_literals, "addr");
    WHITESPACE_PATTERN.replace_all(&no_addresses, " ").trim().to_string()
}

/// `category + "-" + 12-hex-digit hash` of the normalized message
/// (SPEC_FULL §4.D step 7). Stable across runs and across paths/lines/
/// literals, per the round-trip law `signature(cat, normalize(m)) ==
/// signature(cat, m)` (SPEC_FULL §8).
pub fn generate_signature(category: &str, message: &str) -> String {
    let normalized = normalize(message);
    let mut hasher = Md5::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{category}-{}", &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_across_paths_and_lines() {
        let a = generate_signature("typecheck", "src/util.ts(12,5): Type 'string' is not assignable");
        let b = generate_signature("typecheck", "src/other.ts(99,1): Type 'string' is not assignable");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_is_idempotent_under_renormalization() {
        let message = "Error at line 42: cannot find 'foo' at 0xDEADBEEF";
        let direct = generate_signature("lint", message);
        let renormalized = generate_signature("lint", &normalize(message));
        assert_eq!(direct, renormalized);
    }

    #[test]
    fn signature_has_category_prefix_and_twelve_hex_digits() {
        let sig = generate_signature("build", "something broke");
        let (category, hash) = sig.split_once('-').unwrap();
        assert_eq!(category, "build");
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_messages_produce_different_signatures() {
        let a = generate_signature("test", "expected 1 got 2");
        let b = generate_signature("test", "expected 3 got 4");
        assert_ne!(a, b);
    }
}
