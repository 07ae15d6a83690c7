use crate::keywords::{find_affected_keywords, CRITICAL_KEYWORDS};
use crate::linediff::diff_lines;
use crate::tfidf::semantic_similarity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    NoChange,
    Addition,
    Deletion,
    Modification,
    Clarification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalChange {
    pub section_code: String,
    pub change_type: ChangeType,
    pub severity: Severity,
    pub old_text: Option<String>,
    pub new_text: Option<String>,
    pub diff_score: f64,
    pub semantic_score: f64,
    pub keywords_affected: Vec<String>,
}

/// Full diff analysis of an old/new text pair for a given section.
pub fn analyze_changes(old_text: &str, new_text: &str, section_code: &str) -> LegalChange {
    let diff = diff_lines(old_text, new_text);
    let change_type = classify_change_type(&diff.added, &diff.removed);
    let diff_score = compute_diff_score(&diff.added, &diff.removed);
    let semantic_score = semantic_similarity(old_text, new_text);
    let keywords_affected = find_affected_keywords(old_text, new_text);
    let severity = classify_severity(diff_score, semantic_score, &keywords_affected, change_type);

    LegalChange {
        section_code: section_code.to_string(),
        change_type,
        severity,
        old_text: Some(old_text.to_string()),
        new_text: Some(new_text.to_string()),
        diff_score,
        semantic_score,
        keywords_affected,
    }
}

fn classify_change_type(added: &[String], removed: &[String]) -> ChangeType {
    if added.is_empty() && removed.is_empty() {
        return ChangeType::NoChange;
    }

    if !added.is_empty() && !removed.is_empty() {
        for added_line in added {
            for removed_line in removed {
                if added_line.contains(removed_line.as_str()) {
                    return ChangeType::Addition;
                }
                if removed_line.contains(added_line.as_str()) {
                    return ChangeType::Deletion;
                }
                if added_line.len() > removed_line.len()
                    && (added_line.contains(removed_line.as_str()) || added_line.starts_with(removed_line.as_str()))
                {
                    return ChangeType::Addition;
                }
            }
        }
        return ChangeType::Modification;
    }

    if !added.is_empty() {
        return ChangeType::Addition;
    }
    if !removed.is_empty() {
        return ChangeType::Deletion;
    }
    ChangeType::Clarification
}

fn compute_diff_score(added: &[String], removed: &[String]) -> f64 {
    let added_chars: usize = added.iter().map(|l| l.len()).sum();
    let removed_chars: usize = removed.iter().map(|l| l.len()).sum();
    let total = added_chars + removed_chars;
    if total == 0 {
        return 0.0;
    }
    (total as f64 / 100.0).min(1.0)
}

fn classify_severity(
    diff_score: f64,
    semantic_score: f64,
    keywords_affected: &[String],
    change_type: ChangeType,
) -> Severity {
    let has_critical_keyword = keywords_affected
        .iter()
        .any(|kw| CRITICAL_KEYWORDS.contains(kw.as_str()));
    if has_critical_keyword {
        return Severity::High;
    }

    if change_type == ChangeType::Clarification {
        return Severity::Low;
    }

    if semantic_score > 0.9 && diff_score <= 0.10 {
        return Severity::Low;
    }

    if diff_score > 0.4 || semantic_score < 0.6 {
        return Severity::High;
    }

    if diff_score > 0.15 || semantic_score < 0.85 {
        return Severity::Medium;
    }

    Severity::Low
}

/// Human-readable one-line summary of a `LegalChange`, for alert payloads.
pub fn change_summary(change: &LegalChange) -> String {
    let mut parts = Vec::new();
    parts.push(
        match change.change_type {
            ChangeType::Addition => "New text added",
            ChangeType::Deletion => "Text removed",
            ChangeType::Modification => "Existing text modified",
            ChangeType::Clarification => "Wording clarified",
            ChangeType::NoChange => "No change",
        }
        .to_string(),
    );
    if !change.keywords_affected.is_empty() {
        let shown: Vec<&str> = change.keywords_affected.iter().take(3).map(|s| s.as_str()).collect();
        parts.push(format!("Keywords affected: {}", shown.join(", ")));
    }
    parts.push(format!("Severity: {:?}", change.severity));
    parts.push(format!("Semantic similarity: {:.2}", change.semantic_score));
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_yield_no_change() {
        let text = "Providers shall comply with this Regulation.";
        let change = analyze_changes(text, text, "Article9");
        assert_eq!(change.change_type, ChangeType::NoChange);
        assert_eq!(change.diff_score, 0.0);
    }

    #[test]
    fn pure_addition_is_classified_as_addition() {
        let old = "Providers shall comply.";
        let new = "Providers shall comply.\nThey shall also keep records.";
        let change = analyze_changes(old, new, "Article9");
        assert_eq!(change.change_type, ChangeType::Addition);
    }

    #[test]
    fn newly_introduced_critical_keyword_forces_high_severity() {
        let old = "Providers document the system.";
        let new = "Providers shall document the system or face a penalty.";
        let change = analyze_changes(old, new, "Article9");
        assert_eq!(change.severity, Severity::High);
        assert!(change.keywords_affected.iter().any(|k| k == "shall"));
    }

    #[test]
    fn near_identical_text_with_small_diff_is_low_severity() {
        let old = "Providers shall establish and maintain technical documentation for high-risk AI systems in accordance with this Regulation.";
        let new = "Providers shall establish and maintain technical documentation for high-risk AI systems in accordance with this Regulation and Annex IV.";
        let change = analyze_changes(old, new, "Article11");
        assert_eq!(change.severity, Severity::Low);
    }

    #[test]
    fn unrelated_replacement_text_is_high_severity() {
        let old = "Providers shall establish a quality management system.";
        let new = "Notified bodies shall charge reasonable and proportionate fees for conformity assessment.";
        let change = analyze_changes(old, new, "Article17");
        assert_eq!(change.severity, Severity::High);
    }
}
