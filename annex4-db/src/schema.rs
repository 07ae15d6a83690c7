use annex4_core::{AnnexError, AnnexResult};
use sqlx::{Pool, Postgres};

pub struct DatabaseSchema;

impl DatabaseSchema {
    pub async fn create_all_tables(pool: &Pool<Postgres>) -> AnnexResult<()> {
        Self::create_regulations_table(pool).await?;
        Self::create_rules_table(pool).await?;
        Self::create_documents_table(pool).await?;
        Self::create_document_rule_mappings_table(pool).await?;
        Self::create_compliance_alerts_table(pool).await?;
        Self::create_sources_table(pool).await?;
        Self::create_regulation_source_log_table(pool).await?;
        Self::create_indexes(pool).await?;
        Ok(())
    }

    async fn exec(pool: &Pool<Postgres>, operation: &str, query: &str) -> AnnexResult<()> {
        sqlx::query(query)
            .execute(pool)
            .await
            .map_err(|e| AnnexError::DatabaseError {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn create_regulations_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS regulations (
                id UUID PRIMARY KEY,
                name VARCHAR(300) NOT NULL,
                celex_id VARCHAR(32) NOT NULL,
                version VARCHAR(32) NOT NULL,
                expression_version VARCHAR(32),
                work_date TIMESTAMPTZ,
                effective_date TIMESTAMPTZ,
                source_url TEXT NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                content_hash VARCHAR(64) NOT NULL,
                CONSTRAINT valid_regulation_status CHECK (status IN ('active', 'draft', 'superseded')),
                CONSTRAINT uq_regulation_version UNIQUE (celex_id, version)
            );
        "#;
        Self::exec(pool, "create_regulations_table", query).await
    }

    async fn create_rules_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS rules (
                id UUID PRIMARY KEY,
                regulation_id UUID NOT NULL REFERENCES regulations(id) ON DELETE CASCADE,
                section_code VARCHAR(128) NOT NULL,
                title TEXT,
                content TEXT NOT NULL,
                risk_level VARCHAR(20) NOT NULL DEFAULT 'low',
                version VARCHAR(32) NOT NULL,
                parent_rule_id UUID REFERENCES rules(id) ON DELETE SET NULL,
                effective_date TIMESTAMPTZ,
                last_modified TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                order_index VARCHAR(16),
                ingested_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT valid_risk_level CHECK (risk_level IN ('critical', 'high', 'medium', 'low')),
                CONSTRAINT uq_rule_section UNIQUE (regulation_id, section_code)
            );
        "#;
        Self::exec(pool, "create_rules_table", query).await
    }

    async fn create_documents_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS documents (
                id UUID PRIMARY KEY,
                filename VARCHAR(500) NOT NULL,
                file_path TEXT NOT NULL,
                extracted_text TEXT NOT NULL,
                ai_system_name VARCHAR(300),
                document_type VARCHAR(30) NOT NULL,
                compliance_status VARCHAR(20) NOT NULL DEFAULT 'under_review',
                storage_tier VARCHAR(10) NOT NULL DEFAULT 'hot',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_modified TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT valid_document_type CHECK (document_type IN (
                    'risk_assessment', 'training_data', 'validation', 'incident_log'
                )),
                CONSTRAINT valid_compliance_status CHECK (compliance_status IN (
                    'compliant', 'outdated', 'under_review', 'non_compliant'
                )),
                CONSTRAINT valid_storage_tier CHECK (storage_tier IN ('hot', 'warm', 'cold'))
            );
        "#;
        Self::exec(pool, "create_documents_table", query).await
    }

    async fn create_document_rule_mappings_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS document_rule_mappings (
                id UUID PRIMARY KEY,
                document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                rule_id UUID NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
                confidence_score DOUBLE PRECISION NOT NULL,
                mapped_by VARCHAR(20) NOT NULL DEFAULT 'auto',
                mapped_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_verified TIMESTAMPTZ,
                CONSTRAINT valid_confidence_score CHECK (confidence_score >= 0.0 AND confidence_score <= 1.0),
                CONSTRAINT valid_mapped_by CHECK (mapped_by IN ('auto', 'manual', 'ai_suggested'))
            );
        "#;
        Self::exec(pool, "create_document_rule_mappings_table", query).await
    }

    async fn create_compliance_alerts_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS compliance_alerts (
                id UUID PRIMARY KEY,
                alert_type VARCHAR(30) NOT NULL,
                priority VARCHAR(10) NOT NULL,
                message TEXT NOT NULL,
                document_id UUID REFERENCES documents(id) ON DELETE SET NULL,
                rule_id UUID REFERENCES rules(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT valid_alert_type CHECK (alert_type IN (
                    'rule_updated', 'document_outdated', 'new_requirement', 'press_release', 'rss_update'
                )),
                CONSTRAINT valid_alert_priority CHECK (priority IN ('urgent', 'high', 'medium', 'low'))
            );
        "#;
        Self::exec(pool, "create_compliance_alerts_table", query).await
    }

    async fn create_sources_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS sources (
                id VARCHAR(100) PRIMARY KEY,
                url TEXT NOT NULL,
                source_type VARCHAR(20) NOT NULL,
                freq VARCHAR(10) NOT NULL DEFAULT '24h',
                active BOOLEAN NOT NULL DEFAULT TRUE,
                last_fetched TIMESTAMPTZ,
                extra JSONB NOT NULL DEFAULT '{}',
                CONSTRAINT valid_source_type CHECK (source_type IN ('eli_sparql', 'rss', 'html', 'press_api'))
            );
        "#;
        Self::exec(pool, "create_sources_table", query).await
    }

    async fn create_regulation_source_log_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS regulation_source_log (
                id UUID PRIMARY KEY,
                source_id VARCHAR(100) NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                status VARCHAR(10) NOT NULL,
                fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                content_hash VARCHAR(64),
                response_time_ms BIGINT,
                error_message TEXT,
                bytes_downloaded BIGINT,
                fetch_mode VARCHAR(40),
                CONSTRAINT valid_log_status CHECK (status IN ('success', 'error'))
            );
        "#;
        Self::exec(pool, "create_regulation_source_log_table", query).await
    }

    async fn create_indexes(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let statements = [
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_regulation_celex_version ON regulations (celex_id, version);",
            "CREATE INDEX IF NOT EXISTS idx_regulation_celex_hash ON regulations (celex_id, content_hash);",
            "CREATE INDEX IF NOT EXISTS idx_rule_regulation_section ON rules (regulation_id, section_code);",
            "CREATE INDEX IF NOT EXISTS idx_rule_parent ON rules (parent_rule_id);",
            "CREATE INDEX IF NOT EXISTS idx_source_log_source_fetched ON regulation_source_log (source_id, fetched_at DESC);",
            "CREATE INDEX IF NOT EXISTS idx_mapping_rule ON document_rule_mappings (rule_id);",
        ];
        for statement in statements {
            Self::exec(pool, "create_indexes", statement).await?;
        }
        Ok(())
    }

    pub async fn create_schema_version_table(pool: &Pool<Postgres>) -> AnnexResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version VARCHAR(20) PRIMARY KEY,
                description TEXT,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        "#;
        Self::exec(pool, "create_schema_version_table", query).await
    }

    pub async fn record_schema_version(pool: &Pool<Postgres>, version: &str, description: &str) -> AnnexResult<()> {
        let query = r#"
            INSERT INTO schema_version (version, description)
            VALUES ($1, $2)
            ON CONFLICT (version) DO NOTHING;
        "#;
        sqlx::query(query)
            .bind(version)
            .bind(description)
            .execute(pool)
            .await
            .map_err(|e| AnnexError::DatabaseError {
                operation: "record_schema_version".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
