//! Fuses keyword and semantic signals into a single confidence score.
//! Grounded on `original_source/annex4parser/mapper/combined_mapper.py`.

use crate::keyword::match_rules;
use crate::semantic::semantic_match;
use annex4_core::RegulationStore;
use std::collections::{HashMap, HashSet};

pub const KEYWORD_WEIGHT: f64 = 0.30;
pub const SEMANTIC_WEIGHT: f64 = 0.70;

/// `score(code) = KEYWORD_WEIGHT * 1[code in keyword_hits] + SEMANTIC_WEIGHT
/// * semantic_hits.get(code, 0)`, clipped to 1.0. The result is the union of
/// keyword and semantic hits.
pub async fn combined_match<S: RegulationStore + ?Sized>(
    store: &S,
    doc_text: &str,
    keyword_map: &HashMap<String, String>,
    tfidf_threshold: f64,
) -> annex4_core::AnnexResult<HashMap<String, f64>> {
    let keyword_hits = match_rules(doc_text, keyword_map);
    let semantic_hits = semantic_match(store, doc_text, tfidf_threshold).await?;

    let codes: HashSet<&String> = keyword_hits.keys().chain(semantic_hits.keys()).collect();
    let mut result = HashMap::new();
    for code in codes {
        let keyword_flag = if keyword_hits.contains_key(code) { 1.0 } else { 0.0 };
        let semantic_value = semantic_hits.get(code).copied().unwrap_or(0.0);
        let score = (KEYWORD_WEIGHT * keyword_flag + SEMANTIC_WEIGHT * semantic_value).min(1.0);
        result.insert(code.clone(), score);
    }
    Ok(result)
}

/// Convenience wrapper using the default TF-IDF threshold from
/// `semantic_match` (spec.md §4.9 doesn't redefine the threshold, it
/// reuses the semantic mapper's default of 0.1; the Python original's
/// `combined_mapper.py` uses a looser 0.05 default specifically for the
/// fused call, which we keep here to preserve its recall characteristics).
pub async fn combined_match_default<S: RegulationStore + ?Sized>(
    store: &S,
    doc_text: &str,
    keyword_map: &HashMap<String, String>,
) -> annex4_core::AnnexResult<HashMap<String, f64>> {
    combined_match(store, doc_text, keyword_map, 0.05).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::DEFAULT_KEYWORD_MAP;
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
    async fn keyword_and_semantic_hits_both_clear_the_fusion_threshold() {
        let store = InMemoryRegulationStore::new();
        let regulation_id = RegulationId::new();
        store
            .upsert_rule(rule(regulation_id, "Article9.2", "Providers shall perform risk management."))
            .await
            .unwrap();
        store
            .upsert_rule(rule(regulation_id, "Article15.3", "Providers shall keep technical documentation."))
            .await
            .unwrap();

        let hits = combined_match(
            &store,
            "Our AI system implements risk management and maintains proper documentation.",
            &DEFAULT_KEYWORD_MAP,
            0.05,
        )
        .await
        .unwrap();

        assert!(hits.get("Article9.2").copied().unwrap_or(0.0) >= KEYWORD_WEIGHT);
        assert!(hits.get("Article15.3").copied().unwrap_or(0.0) >= KEYWORD_WEIGHT);
    }

    #[tokio::test]
    async fn score_never_exceeds_one() {
        let store = InMemoryRegulationStore::new();
        let regulation_id = RegulationId::new();
        store
            .upsert_rule(rule(regulation_id, "Article9.2", "risk management risk management risk management"))
            .await
            .unwrap();
        let doc = "risk management risk management risk management";
        let hits = combined_match(&store, doc, &DEFAULT_KEYWORD_MAP, 0.05).await.unwrap();
        assert!(hits.values().all(|&v| v <= 1.0));
    }
}
