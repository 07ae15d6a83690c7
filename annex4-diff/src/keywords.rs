//! Critical/important keyword sets used to weigh how much legal weight a
//! change carries, independent of its raw diff size.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub static CRITICAL_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "shall", "must", "required", "obligatory", "mandatory", "prohibited", "forbidden",
        "illegal", "criminal", "penalty", "fine", "sanction", "liability", "risk", "safety",
        "security", "privacy", "data protection",
    ]
    .into_iter()
    .collect()
});

pub static IMPORTANT_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "may", "should", "recommended", "guidance", "best practice", "documentation", "record",
        "log", "audit", "compliance", "assessment", "evaluation", "monitoring", "supervision",
    ]
    .into_iter()
    .collect()
});

fn whole_word_count(text: &str, phrase: &str) -> usize {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(text).count(),
        Err(_) => 0,
    }
}

/// Keywords whose occurrence count differs between `old_text` and `new_text`.
pub fn find_affected_keywords(old_text: &str, new_text: &str) -> Vec<String> {
    let mut affected = Vec::new();
    for keyword in CRITICAL_KEYWORDS.iter().chain(IMPORTANT_KEYWORDS.iter()) {
        let old_count = whole_word_count(old_text, keyword);
        let new_count = whole_word_count(new_text, keyword);
        if old_count != new_count {
            affected.push((*keyword).to_string());
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_newly_introduced_critical_keyword() {
        let old = "Providers document the system.";
        let new = "Providers shall document the system.";
        let affected = find_affected_keywords(old, new);
        assert!(affected.contains(&"shall".to_string()));
    }

    #[test]
    fn stable_keyword_counts_are_not_reported() {
        let old = "Providers shall comply with this Regulation.";
        let new = "Providers shall comply with this Regulation fully.";
        let affected = find_affected_keywords(old, new);
        assert!(!affected.contains(&"shall".to_string()));
    }
}
