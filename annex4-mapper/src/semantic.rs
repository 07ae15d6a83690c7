//! TF-IDF semantic document-to-rule mapping. Grounded on
//! `original_source/annex4parser/mapper/semantic_mapper.py`: fit a
//! vectorizer over `[doc_text, rule.content, ...]` and keep rules whose
//! cosine similarity to the document clears `threshold`.

use annex4_core::RegulationStore;
use annex4_diff::corpus_cosine_similarities;
use std::collections::HashMap;

pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Cosine similarity between `doc_text` and every rule's content, fit in a
/// single corpus. Only rules scoring `>= threshold` are returned. An empty
/// rule set or blank document text yields an empty map.
pub async fn semantic_match<S: RegulationStore + ?Sized>(
    store: &S,
    doc_text: &str,
    threshold: f64,
) -> annex4_core::AnnexResult<HashMap<String, f64>> {
    let rules = store.all_rules().await?;
    if rules.is_empty() || doc_text.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let contents: Vec<&str> = rules.iter().map(|r| r.content.as_str()).collect();
    let scores = corpus_cosine_similarities(doc_text, &contents);

    let mut result = HashMap::new();
    for (rule, score) in rules.iter().zip(scores.into_iter()) {
        if score >= threshold {
            result.insert(rule.section_code.clone(), score);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex4_core::*;
    use annex4_db::InMemoryRegulationStore;
    use chrono::Utc;

    fn rule(regulation_id: RegulationId, code: &str, content: &str) -> Rule {
        Rule {
            id: RuleId::new(),
            regulation_id,
            section_code: code.to_string(),
            title: None,
            content: content.to_string(),
            risk_level: RiskLevel::Medium,
            version: "1".to_string(),
            parent_rule_id: None,
            effective_date: None,
            last_modified: Utc::now(),
            order_index: "001".to_string(),
            ingested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn scores_closer_rule_higher_and_respects_threshold() {
        let store = InMemoryRegulationStore::new();
        let regulation_id = RegulationId::new();
        store
            .upsert_rule(rule(
                regulation_id,
                "Article9.2",
                "Providers shall perform risk management throughout the AI system lifecycle.",
            ))
            .await
            .unwrap();
        store
            .upsert_rule(rule(
                regulation_id,
                "Article17",
                "Notified bodies shall charge proportionate conformity assessment fees.",
            ))
            .await
            .unwrap();

        let hits = semantic_match(
            &store,
            "Our AI system implements risk management and maintains proper documentation.",
            DEFAULT_THRESHOLD,
        )
        .await
        .unwrap();

        assert!(hits.contains_key("Article9.2"));
    }

    #[tokio::test]
    async fn no_rules_yields_empty_map() {
        let store = InMemoryRegulationStore::new();
        let hits = semantic_match(&store, "some document text", DEFAULT_THRESHOLD).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn blank_document_yields_empty_map() {
        let store = InMemoryRegulationStore::new();
        let regulation_id = RegulationId::new();
        store.upsert_rule(rule(regulation_id, "Article9.2", "content")).await.unwrap();
        let hits = semantic_match(&store, "   ", DEFAULT_THRESHOLD).await.unwrap();
        assert!(hits.is_empty());
    }
}
