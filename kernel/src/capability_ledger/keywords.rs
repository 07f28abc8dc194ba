//! Keyword extraction shared between the Capability Ledger (match against
//! the closed action vocabulary) and the AST Index's relevance scoring
//! (match against exported symbols and filenames), SPEC_FULL §4.B/§4.C.

use super::model::ACTION_VOCABULARY;

/// A small closed stop-word list, excluded from relevance/keyword tokens
/// regardless of length.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "onto", "then", "than", "when",
    "where", "what", "which", "who", "how", "are", "was", "were", "been", "being", "have", "has",
    "had", "not", "but", "also", "its", "our", "their", "you", "your", "all", "any", "can",
    "should", "would", "could", "will", "shall",
];

/// Lowercase word tokens (≥3 chars) plus camelCase components, split out of
/// free text and filtered against [`STOP_WORDS`].
pub fn extract_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        for part in split_camel_case(word) {
            let lower = part.to_lowercase();
            if lower.len() >= 3 && !STOP_WORDS.contains(&lower.as_str()) {
                tokens.push(lower);
            }
        }
    }
    tokens
}

/// Split `fooBarBaz` into `["foo", "Bar", "Baz"]`; words with no internal
/// capitalization pass through unchanged.
fn split_camel_case(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        if ch.is_uppercase() && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    if parts.len() > 1 {
        parts
    } else {
        vec![word.to_string()]
    }
}

/// The subset of an objective's tokens that are also action-vocabulary
/// verbs, in first-seen order with no duplicates.
pub fn matched_action_keywords(objective: &str) -> Vec<&'static str> {
    let tokens = extract_tokens(objective);
    let mut matched = Vec::new();
    for verb in ACTION_VOCABULARY {
        if tokens.iter().any(|t| t == verb) && !matched.contains(verb) {
            matched.push(*verb);
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lowercase_tokens_and_drops_short_ones() {
        let tokens = extract_tokens("Fix the typo in src/util.ts");
        assert!(tokens.contains(&"fix".to_string()));
        assert!(tokens.contains(&"typo".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"in".to_string()));
    }

    #[test]
    fn splits_camel_case_components() {
        let tokens = extract_tokens("refactor loginHandler");
        assert!(tokens.contains(&"login".to_string()));
        assert!(tokens.contains(&"handler".to_string()));
    }

    #[test]
    fn matches_action_vocabulary_intersection() {
        let matched = matched_action_keywords("Refactor the login handler and fix the bug");
        assert!(matched.contains(&"refactor"));
        assert!(matched.contains(&"fix"));
        assert!(!matched.contains(&"add"));
    }

    #[test]
    fn no_matches_on_objective_with_no_action_verbs() {
        assert!(matched_action_keywords("Hello world").is_empty());
    }
}
