//! "Smart" truncation: prefer a paragraph boundary, then a sentence
//! boundary, then a word boundary, always leaving a visible marker
//! (SPEC_FULL §4.J).

const TRUNCATION_MARKER: &str = "\n\n[...truncated]";

pub fn smart_truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(TRUNCATION_MARKER.len());
    let clipped: String = text.chars().take(budget).collect();

    let cut = paragraph_boundary(&clipped)
        .or_else(|| sentence_boundary(&clipped))
        .or_else(|| word_boundary(&clipped))
        .unwrap_or(clipped.len());

    let mut result = clipped[..cut].to_string();
    result.push_str(TRUNCATION_MARKER);
    result
}

fn paragraph_boundary(s: &str) -> Option<usize> {
    s.rfind("\n\n").filter(|&idx| idx > 0)
}

fn sentence_boundary(s: &str) -> Option<usize> {
    s.rfind(['.', '!', '?']).map(|idx| idx + 1)
}

fn word_boundary(s: &str) -> Option<usize> {
    s.rfind(char::is_whitespace)
}
