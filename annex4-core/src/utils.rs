use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// SHA-256 of `input`, hex-encoded. Used for `Regulation.content_hash`
/// and RSS entry dedup hashes.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Case-insensitive whole-word occurrence count of `phrase` in `text`.
/// `phrase` may contain spaces (e.g. "data protection").
pub fn whole_word_count(text: &str, phrase: &str) -> usize {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(text).count(),
        Err(_) => 0,
    }
}

/// Case-insensitive whole-word search; true if `phrase` occurs at least once.
pub fn contains_whole_word(text: &str, phrase: &str) -> bool {
    whole_word_count(text, phrase) > 0
}

pub fn merge_metadata(
    base: &HashMap<String, String>,
    overlay: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut result = base.clone();
    for (key, value) in overlay {
        result.insert(key.clone(), value.clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_stable() {
        assert_eq!(sha256_hex("hello"), sha256_hex("hello"));
        assert_ne!(sha256_hex("hello"), sha256_hex("hellO"));
    }

    #[test]
    fn whole_word_match_respects_boundaries() {
        assert!(contains_whole_word("providers shall comply", "shall"));
        assert!(!contains_whole_word("marshall the troops", "shall"));
    }

    #[test]
    fn multi_word_phrase_matches() {
        assert_eq!(
            whole_word_count("data protection and data protection again", "data protection"),
            2
        );
    }
}
