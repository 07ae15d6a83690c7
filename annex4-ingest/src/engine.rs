//! The versioned ingestion engine. Grounded on
//! `original_source/annex4parser/regulation_monitor.py`'s `RegulationMonitor.update`,
//! generalized from a single SQLAlchemy session to the `RegulationStore`
//! trait so it runs against Postgres or the in-memory test double alike.

use annex4_alerts::AlertEmitter;
use annex4_core::section::{canonicalize, parent_code};
use annex4_core::{
    AlertPriority, AlertType, ComplianceAlert, ComplianceStatus, DocumentRuleMapping, MappedBy,
    MappingId, Regulation, RegulationId, RegulationStatus, RegulationStore, Rule, RuleId,
};
use annex4_diff::{analyze_changes, change_summary, ChangeType, LegalChange, Severity};
use annex4_text::{parse_rules, sanitize_content};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

/// Terms whose presence in a Rule's content forces `risk_level = high`,
/// regardless of its section code. These are intentionally truncated
/// stems (`penalt` matches "penalty"/"penalties", `liabilit` matches
/// "liability"/"liable") rather than whole words.
const RISK_UPGRADE_TERMS: &[&str] = &["shall", "must", "required", "prohibited", "penalt", "liabilit"];

const HIGH_RISK_PREFIXES: &[&str] = &["AnnexIV", "Article9", "Article10", "Article11", "Article15"];
const MEDIUM_RISK_PREFIXES: &[&str] = &["Article12", "Article13", "Article14", "Article17"];

/// Inputs to [`ingest`]. Mirrors the positional parameters of spec.md
/// §4.11's `Ingest(name, version, text, url, celex_id, expression_version?, work_date?)`.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub name: String,
    pub version: String,
    pub text: String,
    pub url: String,
    pub celex_id: String,
    pub expression_version: Option<String>,
    pub work_date: Option<DateTime<Utc>>,
}

impl IngestRequest {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
        celex_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            text: text.into(),
            url: url.into(),
            celex_id: celex_id.into(),
            expression_version: None,
            work_date: None,
        }
    }

    pub fn with_expression_version(mut self, expression_version: impl Into<String>) -> Self {
        self.expression_version = Some(expression_version.into());
        self
    }

    pub fn with_work_date(mut self, work_date: DateTime<Utc>) -> Self {
        self.work_date = Some(work_date);
        self
    }
}

/// Ingests one version of a Regulation, parsing it into Rules, diffing
/// against the previous version, relinking the hierarchy and dispatching
/// alerts. Idempotent on `(celex_id, version)`. On any error after the
/// new Regulation row has been inserted, the insert is rolled back.
pub async fn ingest<S: RegulationStore + ?Sized>(
    store: &S,
    emitter: &AlertEmitter,
    req: IngestRequest,
) -> annex4_core::AnnexResult<Regulation> {
    let clean_text = sanitize_content(&req.text);
    let content_hash = annex4_core::sha256_hex(&clean_text);

    if let Some(existing) = store.find_regulation_by_version(&req.celex_id, &req.version).await? {
        return Ok(existing);
    }

    if let Some(aliased) = alias_by_hash(store, &req, &content_hash).await? {
        return Ok(aliased);
    }

    let previous = store.find_previous_regulation(&req.celex_id).await?;

    let now_ts = Utc::now();
    let regulation = Regulation {
        id: RegulationId::new(),
        name: req.name.clone(),
        celex_id: req.celex_id.clone(),
        version: req.version.clone(),
        expression_version: req.expression_version.clone(),
        work_date: req.work_date,
        effective_date: Some(req.work_date.unwrap_or(now_ts)),
        source_url: Some(req.url.clone()),
        last_updated: now_ts,
        status: RegulationStatus::Active,
        content_hash,
    };
    let regulation = store.insert_regulation(regulation).await?;

    match ingest_rules(store, emitter, &regulation, &req, &clean_text, previous.as_ref(), now_ts).await {
        Ok(()) => Ok(regulation),
        Err(e) => {
            store.rollback_regulation(regulation.id).await?;
            Err(e)
        }
    }
}

/// Step 3: treat an ingest whose content hash matches an existing
/// Regulation as a version alias rather than a new document.
async fn alias_by_hash<S: RegulationStore + ?Sized>(
    store: &S,
    req: &IngestRequest,
    content_hash: &str,
) -> annex4_core::AnnexResult<Option<Regulation>> {
    let Some(mut aliased) = store.find_regulation_by_hash(&req.celex_id, content_hash).await? else {
        return Ok(None);
    };

    aliased.version = req.version.clone();
    if req.expression_version.is_some() {
        aliased.expression_version = req.expression_version.clone();
    }
    if req.work_date.is_some() {
        aliased.work_date = req.work_date;
    }
    if aliased.effective_date.is_none() {
        aliased.effective_date = Some(req.work_date.unwrap_or_else(Utc::now));
    }
    store.update_regulation(aliased.clone()).await?;

    for mut rule in store.rules_for_regulation(aliased.id).await? {
        rule.version = req.version.clone();
        if rule.effective_date.is_none() {
            rule.effective_date = aliased.effective_date;
        }
        store.upsert_rule(rule).await?;
    }

    info!(celex_id = %req.celex_id, version = %req.version, "ingest aliased onto existing content hash");
    Ok(Some(aliased))
}

/// Steps 6-10: parse, insert Rules, link the hierarchy, transfer
/// mappings and dispatch alerts for one freshly inserted Regulation.
async fn ingest_rules<S: RegulationStore + ?Sized>(
    store: &S,
    emitter: &AlertEmitter,
    regulation: &Regulation,
    req: &IngestRequest,
    clean_text: &str,
    previous: Option<&Regulation>,
    now_ts: DateTime<Utc>,
) -> annex4_core::AnnexResult<()> {
    let records = parse_rules(clean_text);

    let previous_rules: HashMap<String, Rule> = match previous {
        Some(prev) => store
            .rules_for_regulation(prev.id)
            .await?
            .into_iter()
            .map(|r| (r.section_code.clone(), r))
            .collect(),
        None => HashMap::new(),
    };

    let mut code_to_rule: HashMap<String, Rule> = HashMap::new();
    let mut changes: HashMap<String, LegalChange> = HashMap::new();

    for record in &records {
        let section_code = canonicalize(&record.section_code);
        let risk_level = infer_risk_level(&section_code, &record.content);

        let parent_id = record
            .parent_section_code
            .as_deref()
            .map(canonicalize)
            .and_then(|parent| code_to_rule.get(&parent).map(|r| r.id));

        let mut effective_date = Some(req.work_date.unwrap_or(now_ts));
        let mut last_modified = now_ts;

        if let Some(previous_rule) = previous_rules.get(&section_code) {
            let change = analyze_changes(&previous_rule.content, &record.content, &section_code);
            if change.change_type == ChangeType::NoChange {
                let work_date_is_newer = req
                    .work_date
                    .map(|d| d > previous_rule.last_modified)
                    .unwrap_or(false);
                if !work_date_is_newer {
                    last_modified = previous_rule.last_modified;
                    effective_date = previous_rule.effective_date.or(effective_date);
                }
            }
            changes.insert(section_code.clone(), change);
        }

        let rule = Rule {
            id: RuleId::new(),
            regulation_id: regulation.id,
            section_code: section_code.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            risk_level,
            version: req.version.clone(),
            parent_rule_id: parent_id,
            effective_date,
            last_modified,
            order_index: record.order_index.clone().unwrap_or_default(),
            ingested_at: now_ts,
        };
        let saved = store.upsert_rule(rule).await?;
        code_to_rule.insert(section_code, saved);
    }

    link_orphans(store, &mut code_to_rule).await?;

    if let Some(prev) = previous {
        transfer_mappings(store, emitter, prev.id, regulation, &code_to_rule, &changes, now_ts).await?;
    }

    emit_rule_change_alerts(store, emitter, regulation, &code_to_rule, &changes, now_ts).await?;

    Ok(())
}

fn infer_risk_level(section_code: &str, content: &str) -> annex4_core::RiskLevel {
    use annex4_core::RiskLevel;

    let mut level = if HIGH_RISK_PREFIXES.iter().any(|p| section_code.starts_with(p)) {
        RiskLevel::High
    } else if MEDIUM_RISK_PREFIXES.iter().any(|p| section_code.starts_with(p)) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let lower = content.to_lowercase();
    if RISK_UPGRADE_TERMS.iter().any(|term| lower.contains(term)) {
        level = RiskLevel::High;
    }
    level
}

/// Step 7 (second pass) / Step 8: link Rules whose parent wasn't yet in
/// `code_to_rule` when they were inserted (a dotted code can appear in
/// the source text before its parent section), and canonicalize +
/// relink descendants of any code that changed shape in the process.
async fn link_orphans<S: RegulationStore + ?Sized>(
    store: &S,
    code_to_rule: &mut HashMap<String, Rule>,
) -> annex4_core::AnnexResult<()> {
    let orphan_codes: Vec<String> = code_to_rule
        .values()
        .filter(|r| r.parent_rule_id.is_none() && r.section_code.contains('.'))
        .map(|r| r.section_code.clone())
        .collect();

    for code in orphan_codes {
        let canonical = canonicalize(&code);
        if canonical != code {
            relink_children(store, code_to_rule, &code, &canonical).await?;
            if let Some(rule_id) = code_to_rule.get(&code).map(|r| r.id) {
                store.rename_rule_code(rule_id, canonical.clone()).await?;
            }
            if let Some(mut rule) = code_to_rule.remove(&code) {
                rule.section_code = canonical.clone();
                code_to_rule.insert(canonical.clone(), rule);
            }
        }

        let Some(parent) = parent_code(&canonical) else {
            continue;
        };
        let parent_id = code_to_rule.get(parent).map(|r| r.id);
        if let Some(parent_id) = parent_id {
            if let Some(rule) = code_to_rule.get_mut(&canonical) {
                rule.parent_rule_id = Some(parent_id);
                store.set_rule_parent(rule.id, parent_id).await?;
            }
        }
    }

    Ok(())
}

/// Renames every Rule whose code is a dotted descendant of `old_prefix`
/// to hang off `new_prefix` instead, both in the in-memory map and in
/// the store (`_relink_children` in the original).
async fn relink_children<S: RegulationStore + ?Sized>(
    store: &S,
    code_to_rule: &mut HashMap<String, Rule>,
    old_prefix: &str,
    new_prefix: &str,
) -> annex4_core::AnnexResult<()> {
    let descendant_prefix = format!("{old_prefix}.");
    let descendants: Vec<String> = code_to_rule
        .keys()
        .filter(|code| code.starts_with(&descendant_prefix))
        .cloned()
        .collect();

    for old_code in descendants {
        let new_code = format!("{new_prefix}{}", &old_code[old_prefix.len()..]);
        if let Some(rule_id) = code_to_rule.get(&old_code).map(|r| r.id) {
            store.rename_rule_code(rule_id, new_code.clone()).await?;
        }
        if let Some(mut rule) = code_to_rule.remove(&old_code) {
            rule.section_code = new_code.clone();
            code_to_rule.insert(new_code, rule);
        }
    }

    Ok(())
}

/// Step 9: carry forward DocumentRuleMappings from the previous version
/// onto the matching new-version Rule, and outdate mapped Documents
/// whenever the underlying section actually changed.
async fn transfer_mappings<S: RegulationStore + ?Sized>(
    store: &S,
    emitter: &AlertEmitter,
    previous_regulation_id: RegulationId,
    regulation: &Regulation,
    code_to_rule: &HashMap<String, Rule>,
    changes: &HashMap<String, LegalChange>,
    now_ts: DateTime<Utc>,
) -> annex4_core::AnnexResult<()> {
    for (section_code, new_rule) in code_to_rule {
        let previous_mappings = store
            .mappings_for_section_in_regulation(previous_regulation_id, section_code)
            .await?;
        if previous_mappings.is_empty() {
            continue;
        }

        let changed = changes
            .get(section_code)
            .map(|c| c.change_type != ChangeType::NoChange)
            .unwrap_or(false);

        for mapping in previous_mappings {
            store
                .insert_mapping(DocumentRuleMapping {
                    id: MappingId::new(),
                    document_id: mapping.document_id,
                    rule_id: new_rule.id,
                    confidence_score: mapping.confidence_score,
                    mapped_by: MappedBy::Auto,
                    mapped_at: now_ts,
                    last_verified: now_ts,
                })
                .await?;

            if !changed {
                continue;
            }

            store.mark_document_outdated(mapping.document_id, now_ts).await?;

            let Some(document) = store.get_document(mapping.document_id).await? else {
                continue;
            };
            store
                .insert_alert(ComplianceAlert {
                    id: annex4_core::AlertId::new(),
                    alert_type: AlertType::DocumentOutdated,
                    priority: AlertPriority::High,
                    message: format!(
                        "Document {} outdated due to changes in {section_code}",
                        document.filename
                    ),
                    document_id: Some(document.id),
                    rule_id: Some(new_rule.id),
                    created_at: now_ts,
                })
                .await?;

            emitter
                .emit_rule_changed(
                    &new_rule.id.to_string(),
                    "high",
                    &regulation.name,
                    section_code,
                    "document_outdated",
                )
                .await;
        }
    }

    Ok(())
}

/// Step 10: every Rule whose diff came back `Severity::High` gets a
/// `rule_updated` alert at `urgent` priority; lesser severities are
/// recorded in the diff (already returned from `analyze_changes`) but
/// stay silent.
async fn emit_rule_change_alerts<S: RegulationStore + ?Sized>(
    store: &S,
    emitter: &AlertEmitter,
    regulation: &Regulation,
    code_to_rule: &HashMap<String, Rule>,
    changes: &HashMap<String, LegalChange>,
    now_ts: DateTime<Utc>,
) -> annex4_core::AnnexResult<()> {
    for (section_code, change) in changes {
        if change.severity != Severity::High {
            continue;
        }
        let Some(rule) = code_to_rule.get(section_code) else {
            continue;
        };

        store
            .insert_alert(ComplianceAlert {
                id: annex4_core::AlertId::new(),
                alert_type: AlertType::RuleUpdated,
                priority: AlertPriority::Urgent,
                message: change_summary(change),
                document_id: None,
                rule_id: Some(rule.id),
                created_at: now_ts,
            })
            .await?;

        emitter
            .emit_rule_changed(
                &rule.id.to_string(),
                "high",
                &regulation.name,
                section_code,
                change_type_str(change.change_type),
            )
            .await;
    }

    Ok(())
}

fn change_type_str(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::NoChange => "no_change",
        ChangeType::Addition => "addition",
        ChangeType::Deletion => "deletion",
        ChangeType::Modification => "modification",
        ChangeType::Clarification => "clarification",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex4_db::InMemoryRegulationStore;

    fn emitter() -> AlertEmitter {
        AlertEmitter::new(None, None)
    }

    #[tokio::test]
    async fn ingesting_the_same_version_twice_is_idempotent() {
        let store = InMemoryRegulationStore::new();
        let emitter = emitter();
        let req = IngestRequest::new(
            "EU AI Act",
            "2024-06-13",
            "Article 9\nRisk management system\n\nProviders shall establish a risk management system.",
            "https://eur-lex.europa.eu/x",
            "32024R1689",
        );

        let first = ingest(&store, &emitter, req.clone()).await.unwrap();
        let second = ingest(&store, &emitter, req).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn identical_content_under_a_new_version_is_aliased_not_duplicated() {
        let store = InMemoryRegulationStore::new();
        let emitter = emitter();
        let text = "Article 9\nRisk management system\n\nProviders shall establish a risk management system.";
        let first = ingest(
            &store,
            &emitter,
            IngestRequest::new("EU AI Act", "v1", text, "https://eur-lex.europa.eu/x", "32024R1689"),
        )
        .await
        .unwrap();

        let aliased = ingest(
            &store,
            &emitter,
            IngestRequest::new("EU AI Act", "v2", text, "https://eur-lex.europa.eu/x", "32024R1689"),
        )
        .await
        .unwrap();

        assert_eq!(first.id, aliased.id);
        assert_eq!(aliased.version, "v2");
    }

    #[tokio::test]
    async fn a_changed_section_produces_a_rule_updated_alert_and_cascades_mappings() {
        let store = InMemoryRegulationStore::new();
        let emitter = emitter();

        let v1 = ingest(
            &store,
            &emitter,
            IngestRequest::new(
                "EU AI Act",
                "v1",
                "Article 9\nRisk management system\n\nProviders document the system.",
                "https://eur-lex.europa.eu/x",
                "32024R1689",
            ),
        )
        .await
        .unwrap();

        let rules = store.rules_for_regulation(v1.id).await.unwrap();
        let rule9 = rules.iter().find(|r| r.section_code == "Article9").unwrap();

        let document = annex4_core::Document {
            id: annex4_core::DocumentId::new(),
            filename: "risk-assessment.pdf".to_string(),
            file_path: "/tmp/risk-assessment.pdf".to_string(),
            extracted_text: String::new(),
            ai_system_name: None,
            document_type: annex4_core::DocumentType::RiskAssessment,
            compliance_status: ComplianceStatus::Compliant,
            storage_tier: annex4_core::StorageTier::Hot,
            created_at: now_utc(),
            last_modified: now_utc(),
        };
        store.seed_document(document.clone());
        store
            .insert_mapping(DocumentRuleMapping {
                id: MappingId::new(),
                document_id: document.id,
                rule_id: rule9.id,
                confidence_score: 0.9,
                mapped_by: MappedBy::Auto,
                mapped_at: now_utc(),
                last_verified: now_utc(),
            })
            .await
            .unwrap();

        let v2 = ingest(
            &store,
            &emitter,
            IngestRequest::new(
                "EU AI Act",
                "v2",
                "Article 9\nRisk management system\n\nProviders shall establish a risk management system or face a penalty.",
                "https://eur-lex.europa.eu/x",
                "32024R1689",
            ),
        )
        .await
        .unwrap();

        let v2_rules = store.rules_for_regulation(v2.id).await.unwrap();
        let new_rule9 = v2_rules.iter().find(|r| r.section_code == "Article9").unwrap();
        assert_eq!(new_rule9.risk_level, annex4_core::RiskLevel::High);

        let mappings = store.mappings_for_rule(new_rule9.id).await.unwrap();
        assert_eq!(mappings.len(), 1);

        let refreshed_document = store.get_document(document.id).await.unwrap().unwrap();
        assert_eq!(refreshed_document.compliance_status, ComplianceStatus::Outdated);
    }

    fn now_utc() -> DateTime<Utc> {
        Utc::now()
    }
}
