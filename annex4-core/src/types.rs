use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(RegulationId);
uuid_id!(RuleId);
uuid_id!(DocumentId);
uuid_id!(MappingId);
uuid_id!(AlertId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulationStatus {
    Active,
    Draft,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    RiskAssessment,
    TrainingData,
    Validation,
    IncidentLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Outdated,
    UnderReview,
    NonCompliant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Hot,
    Warm,
    Cold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappedBy {
    Auto,
    Manual,
    AiSuggested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    RuleUpdated,
    DocumentOutdated,
    NewRequirement,
    PressRelease,
    RssUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Urgent,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    EliSparql,
    Rss,
    Html,
    PressApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Error,
}

/// A named legal act identified by a stable CELEX identifier. Many
/// versions of the same act share a `celex_id`; `(celex_id, version)`
/// is unique (enforced by a DB index, see `annex4-db::schema`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regulation {
    pub id: RegulationId,
    pub name: String,
    pub celex_id: String,
    pub version: String,
    pub expression_version: Option<String>,
    pub work_date: Option<DateTime<Utc>>,
    pub effective_date: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub status: RegulationStatus,
    pub content_hash: String,
}

/// A node in an act's hierarchy (Article/Annex, numbered point, lettered
/// subpoint). `section_code` is always stored canonical (see
/// `annex4_core::section::canonicalize`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub regulation_id: RegulationId,
    pub section_code: String,
    pub title: Option<String>,
    pub content: String,
    pub risk_level: RiskLevel,
    pub version: String,
    pub parent_rule_id: Option<RuleId>,
    pub effective_date: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub order_index: String,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub file_path: String,
    pub extracted_text: String,
    pub ai_system_name: Option<String>,
    pub document_type: DocumentType,
    pub compliance_status: ComplianceStatus,
    pub storage_tier: StorageTier,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRuleMapping {
    pub id: MappingId,
    pub document_id: DocumentId,
    pub rule_id: RuleId,
    pub confidence_score: f64,
    pub mapped_by: MappedBy,
    pub mapped_at: DateTime<Utc>,
    pub last_verified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub id: AlertId,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub message: String,
    pub document_id: Option<DocumentId>,
    pub rule_id: Option<RuleId>,
    pub created_at: DateTime<Utc>,
}

/// A poll target. `extra` captures unknown YAML keys verbatim (celex_id,
/// endpoint, sparql, consolidated, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub source_type: SourceType,
    pub freq: String,
    pub active: bool,
    pub last_fetched: Option<DateTime<Utc>>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl Source {
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    pub fn extra_bool(&self, key: &str) -> bool {
        self.extra.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

/// One row per fetch attempt. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationSourceLog {
    pub id: Uuid,
    pub source_id: String,
    pub status: LogStatus,
    pub fetched_at: DateTime<Utc>,
    pub content_hash: Option<String>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub bytes_downloaded: Option<i64>,
    pub fetch_mode: Option<String>,
}
