use crate::convert::*;
use annex4_core::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use std::collections::HashSet;

/// `RegulationStore` backed by Postgres. Schema is created separately via
/// [`crate::schema::DatabaseSchema::create_all_tables`].
pub struct PostgresRegulationStore {
    pool: Pool<Postgres>,
}

impl PostgresRegulationStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> AnnexResult<()> {
        crate::schema::DatabaseSchema::create_schema_version_table(&self.pool).await?;
        crate::schema::DatabaseSchema::create_all_tables(&self.pool).await?;
        crate::schema::DatabaseSchema::record_schema_version(&self.pool, "1", "initial annex4 schema").await?;
        Ok(())
    }

    fn db_err(operation: &str) -> impl Fn(sqlx::Error) -> AnnexError + '_ {
        move |e| AnnexError::DatabaseError {
            operation: operation.to_string(),
            reason: e.to_string(),
        }
    }

    fn row_to_regulation(row: &sqlx::postgres::PgRow) -> AnnexResult<Regulation> {
        Ok(Regulation {
            id: RegulationId(row.try_get("id").map_err(Self::db_err("row_to_regulation"))?),
            name: row.try_get("name").map_err(Self::db_err("row_to_regulation"))?,
            celex_id: row.try_get("celex_id").map_err(Self::db_err("row_to_regulation"))?,
            version: row.try_get("version").map_err(Self::db_err("row_to_regulation"))?,
            expression_version: row.try_get("expression_version").map_err(Self::db_err("row_to_regulation"))?,
            work_date: row.try_get("work_date").map_err(Self::db_err("row_to_regulation"))?,
            effective_date: row.try_get("effective_date").map_err(Self::db_err("row_to_regulation"))?,
            source_url: row.try_get("source_url").map_err(Self::db_err("row_to_regulation"))?,
            last_updated: row.try_get("last_updated").map_err(Self::db_err("row_to_regulation"))?,
            status: regulation_status_from_db(row.try_get::<String, _>("status").map_err(Self::db_err("row_to_regulation"))?.as_str())?,
            content_hash: row.try_get("content_hash").map_err(Self::db_err("row_to_regulation"))?,
        })
    }

    fn row_to_rule(row: &sqlx::postgres::PgRow) -> AnnexResult<Rule> {
        Ok(Rule {
            id: RuleId(row.try_get("id").map_err(Self::db_err("row_to_rule"))?),
            regulation_id: RegulationId(row.try_get("regulation_id").map_err(Self::db_err("row_to_rule"))?),
            section_code: row.try_get("section_code").map_err(Self::db_err("row_to_rule"))?,
            title: row.try_get("title").map_err(Self::db_err("row_to_rule"))?,
            content: row.try_get("content").map_err(Self::db_err("row_to_rule"))?,
            risk_level: risk_level_from_db(row.try_get::<String, _>("risk_level").map_err(Self::db_err("row_to_rule"))?.as_str())?,
            version: row.try_get("version").map_err(Self::db_err("row_to_rule"))?,
            parent_rule_id: row
                .try_get::<Option<uuid::Uuid>, _>("parent_rule_id")
                .map_err(Self::db_err("row_to_rule"))?
                .map(RuleId),
            effective_date: row.try_get("effective_date").map_err(Self::db_err("row_to_rule"))?,
            last_modified: row.try_get("last_modified").map_err(Self::db_err("row_to_rule"))?,
            order_index: row.try_get::<Option<String>, _>("order_index").map_err(Self::db_err("row_to_rule"))?.unwrap_or_default(),
            ingested_at: row.try_get("ingested_at").map_err(Self::db_err("row_to_rule"))?,
        })
    }

    fn row_to_document(row: &sqlx::postgres::PgRow) -> AnnexResult<Document> {
        Ok(Document {
            id: DocumentId(row.try_get("id").map_err(Self::db_err("row_to_document"))?),
            filename: row.try_get("filename").map_err(Self::db_err("row_to_document"))?,
            file_path: row.try_get("file_path").map_err(Self::db_err("row_to_document"))?,
            extracted_text: row.try_get("extracted_text").map_err(Self::db_err("row_to_document"))?,
            ai_system_name: row.try_get("ai_system_name").map_err(Self::db_err("row_to_document"))?,
            document_type: document_type_from_db(row.try_get::<String, _>("document_type").map_err(Self::db_err("row_to_document"))?.as_str())?,
            compliance_status: compliance_status_from_db(
                row.try_get::<String, _>("compliance_status").map_err(Self::db_err("row_to_document"))?.as_str(),
            )?,
            storage_tier: storage_tier_from_db(row.try_get::<String, _>("storage_tier").map_err(Self::db_err("row_to_document"))?.as_str())?,
            created_at: row.try_get("created_at").map_err(Self::db_err("row_to_document"))?,
            last_modified: row.try_get("last_modified").map_err(Self::db_err("row_to_document"))?,
        })
    }

    fn row_to_mapping(row: &sqlx::postgres::PgRow) -> AnnexResult<DocumentRuleMapping> {
        Ok(DocumentRuleMapping {
            id: MappingId(row.try_get("id").map_err(Self::db_err("row_to_mapping"))?),
            document_id: DocumentId(row.try_get("document_id").map_err(Self::db_err("row_to_mapping"))?),
            rule_id: RuleId(row.try_get("rule_id").map_err(Self::db_err("row_to_mapping"))?),
            confidence_score: row.try_get("confidence_score").map_err(Self::db_err("row_to_mapping"))?,
            mapped_by: mapped_by_from_db(row.try_get::<String, _>("mapped_by").map_err(Self::db_err("row_to_mapping"))?.as_str())?,
            mapped_at: row.try_get("mapped_at").map_err(Self::db_err("row_to_mapping"))?,
            last_verified: row
                .try_get::<Option<DateTime<Utc>>, _>("last_verified")
                .map_err(Self::db_err("row_to_mapping"))?
                .unwrap_or_else(Utc::now),
        })
    }

    fn row_to_source(row: &sqlx::postgres::PgRow) -> AnnexResult<Source> {
        let extra_json: serde_json::Value = row.try_get("extra").map_err(Self::db_err("row_to_source"))?;
        let extra = extra_json
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Ok(Source {
            id: row.try_get("id").map_err(Self::db_err("row_to_source"))?,
            url: row.try_get("url").map_err(Self::db_err("row_to_source"))?,
            source_type: source_type_from_db(row.try_get::<String, _>("source_type").map_err(Self::db_err("row_to_source"))?.as_str())?,
            freq: row.try_get("freq").map_err(Self::db_err("row_to_source"))?,
            active: row.try_get("active").map_err(Self::db_err("row_to_source"))?,
            last_fetched: row.try_get("last_fetched").map_err(Self::db_err("row_to_source"))?,
            extra,
        })
    }
}

#[async_trait]
impl RegulationStore for PostgresRegulationStore {
    async fn find_regulation_by_version(&self, celex_id: &str, version: &str) -> AnnexResult<Option<Regulation>> {
        let row = sqlx::query("SELECT * FROM regulations WHERE celex_id = $1 AND version = $2")
            .bind(celex_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("find_regulation_by_version"))?;
        row.as_ref().map(Self::row_to_regulation).transpose()
    }

    async fn find_regulation_by_hash(&self, celex_id: &str, content_hash: &str) -> AnnexResult<Option<Regulation>> {
        let row = sqlx::query("SELECT * FROM regulations WHERE celex_id = $1 AND content_hash = $2")
            .bind(celex_id)
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("find_regulation_by_hash"))?;
        row.as_ref().map(Self::row_to_regulation).transpose()
    }

    async fn find_previous_regulation(&self, celex_id: &str) -> AnnexResult<Option<Regulation>> {
        let row = sqlx::query(
            "SELECT * FROM regulations WHERE celex_id = $1 ORDER BY effective_date DESC NULLS LAST, last_updated DESC LIMIT 1",
        )
        .bind(celex_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err("find_previous_regulation"))?;
        row.as_ref().map(Self::row_to_regulation).transpose()
    }

    async fn insert_regulation(&self, regulation: Regulation) -> AnnexResult<Regulation> {
        sqlx::query(
            r#"
            INSERT INTO regulations (
                id, name, celex_id, version, expression_version, work_date,
                effective_date, source_url, last_updated, status, content_hash
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(regulation.id.0)
        .bind(&regulation.name)
        .bind(&regulation.celex_id)
        .bind(&regulation.version)
        .bind(&regulation.expression_version)
        .bind(regulation.work_date)
        .bind(regulation.effective_date)
        .bind(&regulation.source_url)
        .bind(regulation.last_updated)
        .bind(regulation_status_to_db(regulation.status))
        .bind(&regulation.content_hash)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err("insert_regulation"))?;
        Ok(regulation)
    }

    async fn update_regulation(&self, regulation: Regulation) -> AnnexResult<()> {
        sqlx::query(
            r#"
            UPDATE regulations SET
                name = $2, version = $3, expression_version = $4, work_date = $5,
                effective_date = $6, source_url = $7, last_updated = $8,
                status = $9, content_hash = $10
            WHERE id = $1
            "#,
        )
        .bind(regulation.id.0)
        .bind(&regulation.name)
        .bind(&regulation.version)
        .bind(&regulation.expression_version)
        .bind(regulation.work_date)
        .bind(regulation.effective_date)
        .bind(&regulation.source_url)
        .bind(regulation.last_updated)
        .bind(regulation_status_to_db(regulation.status))
        .bind(&regulation.content_hash)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err("update_regulation"))?;
        Ok(())
    }

    async fn rollback_regulation(&self, id: RegulationId) -> AnnexResult<()> {
        sqlx::query("DELETE FROM regulations WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(Self::db_err("rollback_regulation"))?;
        Ok(())
    }

    async fn rules_for_regulation(&self, regulation_id: RegulationId) -> AnnexResult<Vec<Rule>> {
        let rows = sqlx::query("SELECT * FROM rules WHERE regulation_id = $1")
            .bind(regulation_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("rules_for_regulation"))?;
        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn find_rule_by_code(&self, regulation_id: RegulationId, section_code: &str) -> AnnexResult<Option<Rule>> {
        let row = sqlx::query("SELECT * FROM rules WHERE regulation_id = $1 AND section_code = $2")
            .bind(regulation_id.0)
            .bind(section_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("find_rule_by_code"))?;
        row.as_ref().map(Self::row_to_rule).transpose()
    }

    async fn upsert_rule(&self, rule: Rule) -> AnnexResult<Rule> {
        sqlx::query(
            r#"
            INSERT INTO rules (
                id, regulation_id, section_code, title, content, risk_level,
                version, parent_rule_id, effective_date, last_modified, order_index, ingested_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (regulation_id, section_code) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                risk_level = EXCLUDED.risk_level,
                version = EXCLUDED.version,
                parent_rule_id = EXCLUDED.parent_rule_id,
                effective_date = EXCLUDED.effective_date,
                last_modified = EXCLUDED.last_modified,
                order_index = EXCLUDED.order_index
            "#,
        )
        .bind(rule.id.0)
        .bind(rule.regulation_id.0)
        .bind(&rule.section_code)
        .bind(&rule.title)
        .bind(&rule.content)
        .bind(risk_level_to_db(rule.risk_level))
        .bind(&rule.version)
        .bind(rule.parent_rule_id.map(|id| id.0))
        .bind(rule.effective_date)
        .bind(rule.last_modified)
        .bind(&rule.order_index)
        .bind(rule.ingested_at)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err("upsert_rule"))?;

        self.find_rule_by_code(rule.regulation_id, &rule.section_code)
            .await?
            .ok_or_else(|| AnnexError::RuleNotFound { id: rule.section_code.clone() })
    }

    async fn set_rule_parent(&self, rule_id: RuleId, parent_rule_id: RuleId) -> AnnexResult<()> {
        sqlx::query("UPDATE rules SET parent_rule_id = $2 WHERE id = $1")
            .bind(rule_id.0)
            .bind(parent_rule_id.0)
            .execute(&self.pool)
            .await
            .map_err(Self::db_err("set_rule_parent"))?;
        Ok(())
    }

    async fn rename_rule_code(&self, rule_id: RuleId, new_code: String) -> AnnexResult<()> {
        sqlx::query("UPDATE rules SET section_code = $2 WHERE id = $1")
            .bind(rule_id.0)
            .bind(new_code)
            .execute(&self.pool)
            .await
            .map_err(Self::db_err("rename_rule_code"))?;
        Ok(())
    }

    async fn all_rules(&self) -> AnnexResult<Vec<Rule>> {
        let rows = sqlx::query("SELECT * FROM rules")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("all_rules"))?;
        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn get_document(&self, id: DocumentId) -> AnnexResult<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err("get_document"))?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn mark_document_outdated(&self, id: DocumentId, when: DateTime<Utc>) -> AnnexResult<()> {
        sqlx::query("UPDATE documents SET compliance_status = $2, last_modified = $3 WHERE id = $1")
            .bind(id.0)
            .bind(compliance_status_to_db(ComplianceStatus::Outdated))
            .bind(when)
            .execute(&self.pool)
            .await
            .map_err(Self::db_err("mark_document_outdated"))?;
        Ok(())
    }

    async fn mappings_for_rule(&self, rule_id: RuleId) -> AnnexResult<Vec<DocumentRuleMapping>> {
        let rows = sqlx::query("SELECT * FROM document_rule_mappings WHERE rule_id = $1")
            .bind(rule_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("mappings_for_rule"))?;
        rows.iter().map(Self::row_to_mapping).collect()
    }

    async fn mappings_for_section_in_regulation(
        &self,
        regulation_id: RegulationId,
        section_code: &str,
    ) -> AnnexResult<Vec<DocumentRuleMapping>> {
        let rows = sqlx::query(
            r#"
            SELECT m.* FROM document_rule_mappings m
            JOIN rules r ON r.id = m.rule_id
            WHERE r.regulation_id = $1 AND r.section_code = $2
            "#,
        )
        .bind(regulation_id.0)
        .bind(section_code)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_err("mappings_for_section_in_regulation"))?;
        rows.iter().map(Self::row_to_mapping).collect()
    }

    async fn insert_mapping(&self, mapping: DocumentRuleMapping) -> AnnexResult<DocumentRuleMapping> {
        sqlx::query(
            r#"
            INSERT INTO document_rule_mappings (
                id, document_id, rule_id, confidence_score, mapped_by, mapped_at, last_verified
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(mapping.id.0)
        .bind(mapping.document_id.0)
        .bind(mapping.rule_id.0)
        .bind(mapping.confidence_score)
        .bind(mapped_by_to_db(mapping.mapped_by))
        .bind(mapping.mapped_at)
        .bind(mapping.last_verified)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err("insert_mapping"))?;
        Ok(mapping)
    }

    async fn insert_alert(&self, alert: ComplianceAlert) -> AnnexResult<ComplianceAlert> {
        sqlx::query(
            r#"
            INSERT INTO compliance_alerts (
                id, alert_type, priority, message, document_id, rule_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(alert.id.0)
        .bind(alert_type_to_db(alert.alert_type))
        .bind(alert_priority_to_db(alert.priority))
        .bind(&alert.message)
        .bind(alert.document_id.map(|id| id.0))
        .bind(alert.rule_id.map(|id| id.0))
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err("insert_alert"))?;
        Ok(alert)
    }

    async fn active_sources(&self) -> AnnexResult<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources WHERE active = TRUE")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("active_sources"))?;
        rows.iter().map(Self::row_to_source).collect()
    }

    async fn active_sources_of_type(&self, source_type: SourceType) -> AnnexResult<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources WHERE active = TRUE AND source_type = $1")
            .bind(source_type_to_db(source_type))
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("active_sources_of_type"))?;
        rows.iter().map(Self::row_to_source).collect()
    }

    async fn upsert_source_config(&self, source: Source) -> AnnexResult<Source> {
        let row = sqlx::query(
            r#"
            INSERT INTO sources (id, url, source_type, freq, active, extra)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                active = EXCLUDED.active,
                freq = EXCLUDED.freq,
                extra = EXCLUDED.extra
            RETURNING *
            "#,
        )
        .bind(&source.id)
        .bind(&source.url)
        .bind(source_type_to_db(source.source_type))
        .bind(&source.freq)
        .bind(source.active)
        .bind(serde_json::to_value(&source.extra).unwrap_or_default())
        .fetch_one(&self.pool)
        .await
        .map_err(Self::db_err("upsert_source_config"))?;
        Self::row_to_source(&row)
    }

    async fn touch_source(&self, id: &str, when: DateTime<Utc>) -> AnnexResult<()> {
        sqlx::query("UPDATE sources SET last_fetched = $2 WHERE id = $1")
            .bind(id)
            .bind(when)
            .execute(&self.pool)
            .await
            .map_err(Self::db_err("touch_source"))?;
        Ok(())
    }

    async fn append_source_log(&self, log: RegulationSourceLog) -> AnnexResult<()> {
        sqlx::query(
            r#"
            INSERT INTO regulation_source_log (
                id, source_id, status, fetched_at, content_hash,
                response_time_ms, error_message, bytes_downloaded, fetch_mode
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(log.id)
        .bind(&log.source_id)
        .bind(log_status_to_db(log.status))
        .bind(log.fetched_at)
        .bind(&log.content_hash)
        .bind(log.response_time_ms)
        .bind(&log.error_message)
        .bind(log.bytes_downloaded)
        .bind(&log.fetch_mode)
        .execute(&self.pool)
        .await
        .map_err(Self::db_err("append_source_log"))?;
        Ok(())
    }

    async fn last_successful_hash(&self, source_id: &str) -> AnnexResult<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT content_hash FROM regulation_source_log
            WHERE source_id = $1 AND status = 'success'
            ORDER BY fetched_at DESC LIMIT 1
            "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err("last_successful_hash"))?;
        Ok(row.and_then(|r| r.try_get("content_hash").ok()))
    }

    async fn seen_content_hashes(&self, source_id: &str) -> AnnexResult<HashSet<String>> {
        let rows = sqlx::query("SELECT content_hash FROM regulation_source_log WHERE source_id = $1 AND content_hash IS NOT NULL")
            .bind(source_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err("seen_content_hashes"))?;
        Ok(rows.iter().filter_map(|r| r.try_get::<String, _>("content_hash").ok()).collect())
    }
}
