//! String <-> enum conversions for columns backed by a `CHECK (... IN (...))`
//! constraint. Kept separate from `serde` (de)serialization so the DB's text
//! representation doesn't silently drift if the JSON wire format changes.

use annex4_core::{
    AlertPriority, AlertType, AnnexError, AnnexResult, ComplianceStatus, DocumentType, LogStatus,
    MappedBy, RegulationStatus, RiskLevel, SourceType, StorageTier,
};

pub fn regulation_status_to_db(v: RegulationStatus) -> &'static str {
    match v {
        RegulationStatus::Active => "active",
        RegulationStatus::Draft => "draft",
        RegulationStatus::Superseded => "superseded",
    }
}

pub fn regulation_status_from_db(s: &str) -> AnnexResult<RegulationStatus> {
    match s {
        "active" => Ok(RegulationStatus::Active),
        "draft" => Ok(RegulationStatus::Draft),
        "superseded" => Ok(RegulationStatus::Superseded),
        other => Err(unknown("regulation.status", other)),
    }
}

pub fn risk_level_to_db(v: RiskLevel) -> &'static str {
    match v {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
        RiskLevel::Critical => "critical",
    }
}

pub fn risk_level_from_db(s: &str) -> AnnexResult<RiskLevel> {
    match s {
        "low" => Ok(RiskLevel::Low),
        "medium" => Ok(RiskLevel::Medium),
        "high" => Ok(RiskLevel::High),
        "critical" => Ok(RiskLevel::Critical),
        other => Err(unknown("rule.risk_level", other)),
    }
}

pub fn document_type_to_db(v: DocumentType) -> &'static str {
    match v {
        DocumentType::RiskAssessment => "risk_assessment",
        DocumentType::TrainingData => "training_data",
        DocumentType::Validation => "validation",
        DocumentType::IncidentLog => "incident_log",
    }
}

pub fn document_type_from_db(s: &str) -> AnnexResult<DocumentType> {
    match s {
        "risk_assessment" => Ok(DocumentType::RiskAssessment),
        "training_data" => Ok(DocumentType::TrainingData),
        "validation" => Ok(DocumentType::Validation),
        "incident_log" => Ok(DocumentType::IncidentLog),
        other => Err(unknown("document.document_type", other)),
    }
}

pub fn compliance_status_to_db(v: ComplianceStatus) -> &'static str {
    match v {
        ComplianceStatus::Compliant => "compliant",
        ComplianceStatus::Outdated => "outdated",
        ComplianceStatus::UnderReview => "under_review",
        ComplianceStatus::NonCompliant => "non_compliant",
    }
}

pub fn compliance_status_from_db(s: &str) -> AnnexResult<ComplianceStatus> {
    match s {
        "compliant" => Ok(ComplianceStatus::Compliant),
        "outdated" => Ok(ComplianceStatus::Outdated),
        "under_review" => Ok(ComplianceStatus::UnderReview),
        "non_compliant" => Ok(ComplianceStatus::NonCompliant),
        other => Err(unknown("document.compliance_status", other)),
    }
}

pub fn storage_tier_to_db(v: StorageTier) -> &'static str {
    match v {
        StorageTier::Hot => "hot",
        StorageTier::Warm => "warm",
        StorageTier::Cold => "cold",
    }
}

pub fn storage_tier_from_db(s: &str) -> AnnexResult<StorageTier> {
    match s {
        "hot" => Ok(StorageTier::Hot),
        "warm" => Ok(StorageTier::Warm),
        "cold" => Ok(StorageTier::Cold),
        other => Err(unknown("document.storage_tier", other)),
    }
}

pub fn mapped_by_to_db(v: MappedBy) -> &'static str {
    match v {
        MappedBy::Auto => "auto",
        MappedBy::Manual => "manual",
        MappedBy::AiSuggested => "ai_suggested",
    }
}

pub fn mapped_by_from_db(s: &str) -> AnnexResult<MappedBy> {
    match s {
        "auto" => Ok(MappedBy::Auto),
        "manual" => Ok(MappedBy::Manual),
        "ai_suggested" => Ok(MappedBy::AiSuggested),
        other => Err(unknown("document_rule_mapping.mapped_by", other)),
    }
}

pub fn alert_type_to_db(v: AlertType) -> &'static str {
    match v {
        AlertType::RuleUpdated => "rule_updated",
        AlertType::DocumentOutdated => "document_outdated",
        AlertType::NewRequirement => "new_requirement",
        AlertType::PressRelease => "press_release",
        AlertType::RssUpdate => "rss_update",
    }
}

pub fn alert_type_from_db(s: &str) -> AnnexResult<AlertType> {
    match s {
        "rule_updated" => Ok(AlertType::RuleUpdated),
        "document_outdated" => Ok(AlertType::DocumentOutdated),
        "new_requirement" => Ok(AlertType::NewRequirement),
        "press_release" => Ok(AlertType::PressRelease),
        "rss_update" => Ok(AlertType::RssUpdate),
        other => Err(unknown("compliance_alert.alert_type", other)),
    }
}

pub fn alert_priority_to_db(v: AlertPriority) -> &'static str {
    match v {
        AlertPriority::Urgent => "urgent",
        AlertPriority::High => "high",
        AlertPriority::Medium => "medium",
        AlertPriority::Low => "low",
    }
}

pub fn alert_priority_from_db(s: &str) -> AnnexResult<AlertPriority> {
    match s {
        "urgent" => Ok(AlertPriority::Urgent),
        "high" => Ok(AlertPriority::High),
        "medium" => Ok(AlertPriority::Medium),
        "low" => Ok(AlertPriority::Low),
        other => Err(unknown("compliance_alert.priority", other)),
    }
}

pub fn source_type_to_db(v: SourceType) -> &'static str {
    match v {
        SourceType::EliSparql => "eli_sparql",
        SourceType::Rss => "rss",
        SourceType::Html => "html",
        SourceType::PressApi => "press_api",
    }
}

pub fn source_type_from_db(s: &str) -> AnnexResult<SourceType> {
    match s {
        "eli_sparql" => Ok(SourceType::EliSparql),
        "rss" => Ok(SourceType::Rss),
        "html" => Ok(SourceType::Html),
        "press_api" => Ok(SourceType::PressApi),
        other => Err(unknown("source.source_type", other)),
    }
}

pub fn log_status_to_db(v: LogStatus) -> &'static str {
    match v {
        LogStatus::Success => "success",
        LogStatus::Error => "error",
    }
}

pub fn log_status_from_db(s: &str) -> AnnexResult<LogStatus> {
    match s {
        "success" => Ok(LogStatus::Success),
        "error" => Ok(LogStatus::Error),
        other => Err(unknown("regulation_source_log.status", other)),
    }
}

fn unknown(field: &str, value: &str) -> AnnexError {
    AnnexError::ValidationError {
        field: field.to_string(),
        message: format!("unrecognized value: {value}"),
    }
}
