//! In-memory `RegulationStore` used by integration tests in `annex4-ingest`
//! so ingestion scenarios run without a Postgres instance.

use annex4_core::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
struct State {
    regulations: HashMap<RegulationId, Regulation>,
    rules: HashMap<RuleId, Rule>,
    documents: HashMap<DocumentId, Document>,
    mappings: HashMap<MappingId, DocumentRuleMapping>,
    alerts: Vec<ComplianceAlert>,
    sources: HashMap<String, Source>,
    source_log: Vec<RegulationSourceLog>,
}

#[derive(Default)]
pub struct InMemoryRegulationStore {
    state: RwLock<State>,
}

impl InMemoryRegulationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a source directly, bypassing `upsert_source_config`'s
    /// preserve/overwrite merge (tests only).
    pub fn seed_source(&self, source: Source) {
        self.state.write().unwrap().sources.insert(source.id.clone(), source);
    }

    /// Seed a document directly (tests only, same reasoning as `seed_source`).
    pub fn seed_document(&self, document: Document) {
        self.state.write().unwrap().documents.insert(document.id, document);
    }

    pub fn alerts(&self) -> Vec<ComplianceAlert> {
        self.state.read().unwrap().alerts.clone()
    }
}

#[async_trait]
impl RegulationStore for InMemoryRegulationStore {
    async fn find_regulation_by_version(&self, celex_id: &str, version: &str) -> AnnexResult<Option<Regulation>> {
        let state = self.state.read().unwrap();
        Ok(state
            .regulations
            .values()
            .find(|r| r.celex_id == celex_id && r.version == version)
            .cloned())
    }

    async fn find_regulation_by_hash(&self, celex_id: &str, content_hash: &str) -> AnnexResult<Option<Regulation>> {
        let state = self.state.read().unwrap();
        Ok(state
            .regulations
            .values()
            .find(|r| r.celex_id == celex_id && r.content_hash == content_hash)
            .cloned())
    }

    async fn find_previous_regulation(&self, celex_id: &str) -> AnnexResult<Option<Regulation>> {
        let state = self.state.read().unwrap();
        Ok(state
            .regulations
            .values()
            .filter(|r| r.celex_id == celex_id)
            .max_by_key(|r| r.effective_date.unwrap_or(r.last_updated))
            .cloned())
    }

    async fn insert_regulation(&self, regulation: Regulation) -> AnnexResult<Regulation> {
        let mut state = self.state.write().unwrap();
        state.regulations.insert(regulation.id, regulation.clone());
        Ok(regulation)
    }

    async fn update_regulation(&self, regulation: Regulation) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        state.regulations.insert(regulation.id, regulation);
        Ok(())
    }

    async fn rollback_regulation(&self, id: RegulationId) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        state.regulations.remove(&id);
        Ok(())
    }

    async fn rules_for_regulation(&self, regulation_id: RegulationId) -> AnnexResult<Vec<Rule>> {
        let state = self.state.read().unwrap();
        Ok(state
            .rules
            .values()
            .filter(|r| r.regulation_id == regulation_id)
            .cloned()
            .collect())
    }

    async fn find_rule_by_code(&self, regulation_id: RegulationId, section_code: &str) -> AnnexResult<Option<Rule>> {
        let state = self.state.read().unwrap();
        Ok(state
            .rules
            .values()
            .find(|r| r.regulation_id == regulation_id && r.section_code == section_code)
            .cloned())
    }

    async fn upsert_rule(&self, rule: Rule) -> AnnexResult<Rule> {
        let mut state = self.state.write().unwrap();
        let existing = state
            .rules
            .values()
            .find(|r| r.regulation_id == rule.regulation_id && r.section_code == rule.section_code)
            .map(|r| r.id);
        if let Some(existing_id) = existing {
            if existing_id != rule.id {
                state.rules.remove(&existing_id);
            }
        }
        state.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn set_rule_parent(&self, rule_id: RuleId, parent_rule_id: RuleId) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        if let Some(rule) = state.rules.get_mut(&rule_id) {
            rule.parent_rule_id = Some(parent_rule_id);
        }
        Ok(())
    }

    async fn rename_rule_code(&self, rule_id: RuleId, new_code: String) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        if let Some(rule) = state.rules.get_mut(&rule_id) {
            rule.section_code = new_code;
        }
        Ok(())
    }

    async fn all_rules(&self) -> AnnexResult<Vec<Rule>> {
        let state = self.state.read().unwrap();
        Ok(state.rules.values().cloned().collect())
    }

    async fn get_document(&self, id: DocumentId) -> AnnexResult<Option<Document>> {
        let state = self.state.read().unwrap();
        Ok(state.documents.get(&id).cloned())
    }

    async fn mark_document_outdated(&self, id: DocumentId, when: DateTime<Utc>) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        if let Some(doc) = state.documents.get_mut(&id) {
            doc.compliance_status = ComplianceStatus::Outdated;
            doc.last_modified = when;
        }
        Ok(())
    }

    async fn mappings_for_rule(&self, rule_id: RuleId) -> AnnexResult<Vec<DocumentRuleMapping>> {
        let state = self.state.read().unwrap();
        Ok(state.mappings.values().filter(|m| m.rule_id == rule_id).cloned().collect())
    }

    async fn mappings_for_section_in_regulation(
        &self,
        regulation_id: RegulationId,
        section_code: &str,
    ) -> AnnexResult<Vec<DocumentRuleMapping>> {
        let state = self.state.read().unwrap();
        let rule_ids: HashSet<RuleId> = state
            .rules
            .values()
            .filter(|r| r.regulation_id == regulation_id && r.section_code == section_code)
            .map(|r| r.id)
            .collect();
        Ok(state
            .mappings
            .values()
            .filter(|m| rule_ids.contains(&m.rule_id))
            .cloned()
            .collect())
    }

    async fn insert_mapping(&self, mapping: DocumentRuleMapping) -> AnnexResult<DocumentRuleMapping> {
        let mut state = self.state.write().unwrap();
        state.mappings.insert(mapping.id, mapping.clone());
        Ok(mapping)
    }

    async fn insert_alert(&self, alert: ComplianceAlert) -> AnnexResult<ComplianceAlert> {
        let mut state = self.state.write().unwrap();
        state.alerts.push(alert.clone());
        Ok(alert)
    }

    async fn active_sources(&self) -> AnnexResult<Vec<Source>> {
        let state = self.state.read().unwrap();
        Ok(state.sources.values().filter(|s| s.active).cloned().collect())
    }

    async fn upsert_source_config(&self, source: Source) -> AnnexResult<Source> {
        let mut state = self.state.write().unwrap();
        let merged = match state.sources.get(&source.id) {
            Some(existing) => Source {
                id: source.id.clone(),
                url: existing.url.clone(),
                source_type: existing.source_type,
                freq: source.freq,
                active: source.active,
                last_fetched: existing.last_fetched,
                extra: source.extra,
            },
            None => source,
        };
        state.sources.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn active_sources_of_type(&self, source_type: SourceType) -> AnnexResult<Vec<Source>> {
        let state = self.state.read().unwrap();
        Ok(state
            .sources
            .values()
            .filter(|s| s.active && s.source_type == source_type)
            .cloned()
            .collect())
    }

    async fn touch_source(&self, id: &str, when: DateTime<Utc>) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        if let Some(source) = state.sources.get_mut(id) {
            source.last_fetched = Some(when);
        }
        Ok(())
    }

    async fn append_source_log(&self, log: RegulationSourceLog) -> AnnexResult<()> {
        let mut state = self.state.write().unwrap();
        state.source_log.push(log);
        Ok(())
    }

    async fn last_successful_hash(&self, source_id: &str) -> AnnexResult<Option<String>> {
        let state = self.state.read().unwrap();
        Ok(state
            .source_log
            .iter()
            .filter(|l| l.source_id == source_id && l.status == LogStatus::Success)
            .max_by_key(|l| l.fetched_at)
            .and_then(|l| l.content_hash.clone()))
    }

    async fn seen_content_hashes(&self, source_id: &str) -> AnnexResult<HashSet<String>> {
        let state = self.state.read().unwrap();
        Ok(state
            .source_log
            .iter()
            .filter(|l| l.source_id == source_id)
            .filter_map(|l| l.content_hash.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_regulation() -> Regulation {
        Regulation {
            id: RegulationId::new(),
            name: "AI Act".to_string(),
            celex_id: "32024R1689".to_string(),
            version: "2024-06-13".to_string(),
            expression_version: None,
            work_date: None,
            effective_date: Some(Utc::now()),
            source_url: Some("https://eur-lex.europa.eu/".to_string()),
            last_updated: Utc::now(),
            status: RegulationStatus::Active,
            content_hash: "abc123".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_version_round_trips() {
        let store = InMemoryRegulationStore::new();
        let regulation = sample_regulation();
        store.insert_regulation(regulation.clone()).await.unwrap();

        let found = store
            .find_regulation_by_version(&regulation.celex_id, &regulation.version)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, regulation.id);
    }

    #[tokio::test]
    async fn upsert_rule_replaces_existing_by_section_code() {
        let store = InMemoryRegulationStore::new();
        let regulation_id = RegulationId::new();
        let rule = Rule {
            id: RuleId::new(),
            regulation_id,
            section_code: "Art.6".to_string(),
            title: Some("Classification".to_string()),
            content: "v1".to_string(),
            risk_level: RiskLevel::Low,
            version: "1".to_string(),
            parent_rule_id: None,
            effective_date: None,
            last_modified: Utc::now(),
            order_index: "0006".to_string(),
            ingested_at: Utc::now(),
        };
        store.upsert_rule(rule.clone()).await.unwrap();

        let mut updated = rule.clone();
        updated.id = RuleId::new();
        updated.content = "v2".to_string();
        store.upsert_rule(updated).await.unwrap();

        let rules = store.rules_for_regulation(regulation_id).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].content, "v2");
    }

    #[tokio::test]
    async fn seen_content_hashes_accumulates_across_log_entries() {
        let store = InMemoryRegulationStore::new();
        store
            .append_source_log(RegulationSourceLog {
                id: uuid::Uuid::new_v4(),
                source_id: "eu-ai-act".to_string(),
                status: LogStatus::Success,
                fetched_at: Utc::now(),
                content_hash: Some("h1".to_string()),
                response_time_ms: Some(10),
                error_message: None,
                bytes_downloaded: Some(100),
                fetch_mode: Some("sparql".to_string()),
            })
            .await
            .unwrap();

        let hashes = store.seen_content_hashes("eu-ai-act").await.unwrap();
        assert!(hashes.contains("h1"));
    }
}
