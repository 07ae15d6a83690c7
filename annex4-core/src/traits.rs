use crate::errors::AnnexResult;
use crate::types::*;
use async_trait::async_trait;

/// Persistence seam implemented by `annex4-db` (Postgres) and, for
/// tests, by an in-memory double. Mirrors the seven tables in spec
/// section 3; the ingestion engine, mappers and monitor depend only on
/// this trait so they can run against either backend.
#[async_trait]
pub trait RegulationStore: Send + Sync {
    async fn find_regulation_by_version(
        &self,
        celex_id: &str,
        version: &str,
    ) -> AnnexResult<Option<Regulation>>;

    async fn find_regulation_by_hash(
        &self,
        celex_id: &str,
        content_hash: &str,
    ) -> AnnexResult<Option<Regulation>>;

    async fn find_previous_regulation(&self, celex_id: &str) -> AnnexResult<Option<Regulation>>;

    async fn insert_regulation(&self, regulation: Regulation) -> AnnexResult<Regulation>;

    async fn update_regulation(&self, regulation: Regulation) -> AnnexResult<()>;

    async fn rollback_regulation(&self, id: RegulationId) -> AnnexResult<()>;

    async fn rules_for_regulation(&self, regulation_id: RegulationId) -> AnnexResult<Vec<Rule>>;

    async fn find_rule_by_code(
        &self,
        regulation_id: RegulationId,
        section_code: &str,
    ) -> AnnexResult<Option<Rule>>;

    async fn upsert_rule(&self, rule: Rule) -> AnnexResult<Rule>;

    async fn set_rule_parent(&self, rule_id: RuleId, parent_rule_id: RuleId) -> AnnexResult<()>;

    async fn rename_rule_code(&self, rule_id: RuleId, new_code: String) -> AnnexResult<()>;

    async fn all_rules(&self) -> AnnexResult<Vec<Rule>>;

    async fn get_document(&self, id: DocumentId) -> AnnexResult<Option<Document>>;

    async fn mark_document_outdated(
        &self,
        id: DocumentId,
        when: chrono::DateTime<chrono::Utc>,
    ) -> AnnexResult<()>;

    async fn mappings_for_rule(&self, rule_id: RuleId) -> AnnexResult<Vec<DocumentRuleMapping>>;

    async fn mappings_for_section_in_regulation(
        &self,
        regulation_id: RegulationId,
        section_code: &str,
    ) -> AnnexResult<Vec<DocumentRuleMapping>>;

    async fn insert_mapping(
        &self,
        mapping: DocumentRuleMapping,
    ) -> AnnexResult<DocumentRuleMapping>;

    async fn insert_alert(&self, alert: ComplianceAlert) -> AnnexResult<ComplianceAlert>;

    async fn active_sources(&self) -> AnnexResult<Vec<Source>>;

    async fn active_sources_of_type(&self, source_type: SourceType) -> AnnexResult<Vec<Source>>;

    /// Applies one entry from a reloaded Source config. `url` and
    /// `source_type` are preserved for an `id` that already exists;
    /// `active`, `freq` and `extra` are always overwritten with the
    /// incoming values. Unknown `id`s are inserted as new Sources.
    async fn upsert_source_config(&self, source: Source) -> AnnexResult<Source>;

    async fn touch_source(&self, id: &str, when: chrono::DateTime<chrono::Utc>) -> AnnexResult<()>;

    async fn append_source_log(&self, log: RegulationSourceLog) -> AnnexResult<()>;

    async fn last_successful_hash(&self, source_id: &str) -> AnnexResult<Option<String>>;

    async fn seen_content_hashes(
        &self,
        source_id: &str,
    ) -> AnnexResult<std::collections::HashSet<String>>;
}