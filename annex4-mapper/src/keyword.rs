//! Keyword-based document-to-rule mapping. Grounded on
//! `original_source/annex4parser/mapper/mapper.py`'s `KEYWORD_MAP` and
//! `match_rules`: a flat `phrase -> section_code` dictionary, matched
//! case-insensitively as whole words, contributing a fixed confidence of
//! 0.8 per hit (max-collapsed when a section code is hit by more than one
//! phrase).

use annex4_core::contains_whole_word;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::Path;

pub const KEYWORD_CONFIDENCE: f64 = 0.8;
pub const KEYWORDS_ENV_VAR: &str = "ANNEX4_KEYWORDS";
const DEFAULT_CONFIG_PATH: &str = "config/keywords.yaml";

/// Built-in fallback map, used whenever the configured YAML is absent or
/// malformed. Mirrors `mapper.py`'s `KEYWORD_MAP` verbatim, including the
/// legacy `Article15.3`/`Article15.4` keys the spec notes may not exist in
/// every deployment's rule tree -- a mismatch there is "no rule to point
/// at", not an error (see spec.md §9).
pub static DEFAULT_KEYWORD_MAP: Lazy<HashMap<String, String>> = Lazy::new(|| {
    [
        ("risk management", "Article9.2"),
        ("risk assessment", "Article9.2"),
        ("risk analysis", "Article9.2"),
        ("foreseeable risks", "Article9.2"),
        ("data governance", "Article10.1"),
        ("training data", "Article10.1"),
        ("data sets", "Article10.1"),
        ("data quality", "Article10.1"),
        ("representative data", "Article10.1"),
        ("statistical properties", "Article10.1"),
        ("documentation", "Article15.3"),
        ("technical documentation", "Article15.3"),
        ("compliance documentation", "Article15.3"),
        ("record keeping", "Article15.4"),
        ("logs", "Article15.4"),
        ("audit trail", "Article15.4"),
        ("system logs", "Article15.4"),
        ("accuracy", "Article16.1"),
        ("robustness", "Article16.1"),
        ("cybersecurity", "Article16.1"),
        ("accuracy metrics", "Article16.1"),
        ("human oversight", "Article17.1"),
        ("human machine interface", "Article17.1"),
        ("human control", "Article17.1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
});

/// Loads the keyword map from `$ANNEX4_KEYWORDS`, falling back to
/// `config/keywords.yaml`, falling back to `DEFAULT_KEYWORD_MAP` when
/// neither path exists or the file fails to parse. Keys are lowercased.
pub fn load_keyword_map() -> HashMap<String, String> {
    let path = env::var(KEYWORDS_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_keyword_map_from(Path::new(&path))
}

pub fn load_keyword_map_from(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<HashMap<String, String>>(&contents) {
            Ok(map) => map.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed keyword yaml, using built-in default map");
                DEFAULT_KEYWORD_MAP.clone()
            }
        },
        Err(_) => {
            tracing::debug!(path = %path.display(), "keyword yaml not found, using built-in default map");
            DEFAULT_KEYWORD_MAP.clone()
        }
    }
}

/// Case-insensitive whole-word keyword scoring. Returns `{section_code:
/// confidence}`; multiple phrase hits for the same code collapse to the max
/// (always `KEYWORD_CONFIDENCE` here, since every hit contributes the same
/// fixed score, but the collapse rule is spelled out for clarity and to
/// match `match_rules`' `max()` accumulation).
pub fn match_rules(doc_text: &str, keyword_map: &HashMap<String, String>) -> HashMap<String, f64> {
    let mut result: HashMap<String, f64> = HashMap::new();
    for (phrase, section_code) in keyword_map {
        if contains_whole_word(doc_text, phrase) {
            let entry = result.entry(section_code.clone()).or_insert(0.0);
            *entry = entry.max(KEYWORD_CONFIDENCE);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_phrase_with_fixed_confidence() {
        let hits = match_rules(
            "Our AI system implements risk management and maintains proper documentation.",
            &DEFAULT_KEYWORD_MAP,
        );
        assert_eq!(hits.get("Article9.2"), Some(&KEYWORD_CONFIDENCE));
        assert_eq!(hits.get("Article15.3"), Some(&KEYWORD_CONFIDENCE));
    }

    #[test]
    fn no_hits_for_unrelated_text() {
        let hits = match_rules("The weather today is sunny.", &DEFAULT_KEYWORD_MAP);
        assert!(hits.is_empty());
    }

    #[test]
    fn whole_word_boundary_avoids_substring_false_positives() {
        let map: HashMap<String, String> =
            [("log".to_string(), "Article15.4".to_string())].into_iter().collect();
        assert!(match_rules("System logs are retained.", &map).is_empty());
        assert!(!match_rules("Keep a log of every decision.", &map).is_empty());
    }

    #[test]
    fn malformed_yaml_falls_back_to_default() {
        let dir = std::env::temp_dir().join(format!("annex4-keywords-test-{}", std::process::id()));
        std::fs::write(&dir, "not: [valid: yaml: -").unwrap();
        let map = load_keyword_map_from(&dir);
        assert_eq!(map, DEFAULT_KEYWORD_MAP.clone());
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let map = load_keyword_map_from(Path::new("/nonexistent/annex4-keywords.yaml"));
        assert_eq!(map, DEFAULT_KEYWORD_MAP.clone());
    }
}
