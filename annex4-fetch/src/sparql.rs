//! SPARQL client for the EUR-Lex CELLAR endpoint (CDM ontology).
//!
//! Resolves regulation metadata and manifestation items by CELEX id, and
//! resolves the latest consolidated CELEX for a base act. Grounded on
//! `original_source/annex4parser/eli_client.py`: same CDM query shape, same
//! GET-then-POST fallback, same retry policy as the Fetcher.

use crate::backoff;
use annex4_core::{AnnexError, AnnexResult};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const SPARQL_TIMEOUT_SECS: u64 = 600;

const CDM_QUERY_TEMPLATE: &str = r#"
PREFIX cdm: <http://publications.europa.eu/ontology/cdm#>
SELECT ?date ?version ?title ?item ?format WHERE {{
  ?w cdm:resource_legal_id_celex "{celex_id}" .
  ?expr cdm:expression_belongs_to_work ?w .
  ?expr cdm:expression_uses_language <http://publications.europa.eu/resource/authority/language/ENG> .
  OPTIONAL {{ ?expr cdm:expression_title ?title }}
  OPTIONAL {{ ?w cdm:work_date_document ?date }}
  OPTIONAL {{ ?expr cdm:expression_version ?version }}
  OPTIONAL {{
    ?expr cdm:expression_manifestation ?item .
    ?item cdm:manifestation_type ?format
  }}
}}
ORDER BY DESC(?date)
"#;

const CONSOLIDATED_QUERY_TEMPLATE: &str = r#"
PREFIX cdm: <http://publications.europa.eu/ontology/cdm#>
SELECT ?celex ?date WHERE {{
  ?w cdm:resource_legal_id_celex ?celex .
  OPTIONAL {{ ?w cdm:work_date_document ?date }}
  FILTER(STRSTARTS(?celex, "{prefix}"))
}}
ORDER BY DESC(?date)
"#;

static CONSOLIDATED_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d{8})$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFormat {
    Pdf,
    Html,
    Other,
}

impl ItemFormat {
    fn from_cdm(value: &str) -> Self {
        let lower = value.to_lowercase();
        if lower.contains("pdf") {
            ItemFormat::Pdf
        } else if lower.contains("html") || lower.contains("htm") {
            ItemFormat::Html
        } else {
            ItemFormat::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestationItem {
    pub url: String,
    pub format: ItemFormat,
}

#[derive(Debug, Clone, Default)]
pub struct SparqlMetadata {
    pub title: Option<String>,
    pub date: Option<String>,
    pub version: Option<String>,
    pub items: Vec<ManifestationItem>,
}

/// Issues CDM/ELI queries against the EUR-Lex SPARQL endpoint.
pub struct SparqlClient {
    client: Client,
    user_agent: String,
}

impl SparqlClient {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(SPARQL_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            user_agent: user_agent.into(),
        }
    }

    /// Metadata (title, work date, expression version) and manifestation
    /// items for the given CELEX id, or `None` if the endpoint returns no
    /// bindings.
    pub async fn fetch_latest(&self, endpoint: &str, celex_id: &str) -> AnnexResult<Option<SparqlMetadata>> {
        let query = CDM_QUERY_TEMPLATE.replace("{celex_id}", celex_id);
        let body = self.run_query(endpoint, &query).await?;
        Ok(parse_metadata(&body))
    }

    /// Resolves the latest consolidated CELEX (form `0YYYY...-YYYYMMDD`)
    /// whose prefix matches `base_celex`, preferring the greatest date and
    /// breaking ties lexicographically on the CELEX id.
    pub async fn resolve_latest_consolidated(
        &self,
        endpoint: &str,
        base_celex: &str,
    ) -> AnnexResult<Option<(String, Option<NaiveDate>)>> {
        let prefix = consolidated_prefix(base_celex);
        let query = CONSOLIDATED_QUERY_TEMPLATE.replace("{prefix}", &prefix);
        let body = self.run_query(endpoint, &query).await?;
        let candidates = parse_consolidated_candidates(&body);
        Ok(pick_latest_consolidated(candidates))
    }

    async fn run_query(&self, endpoint: &str, query: &str) -> AnnexResult<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_get(endpoint, query).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= backoff::MAX_ATTEMPTS {
                        warn!(endpoint, attempt, error = %err, "sparql GET exhausted, trying POST fallback");
                        return self.try_post(endpoint, query).await;
                    }
                    let wait = backoff::duration_for_attempt(attempt);
                    debug!(endpoint, attempt, ?wait, "retrying sparql query");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn try_get(&self, endpoint: &str, query: &str) -> AnnexResult<Value> {
        let resp = self
            .client
            .get(endpoint)
            .query(&[("query", query), ("format", "application/sparql-results+json")])
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| AnnexError::SparqlError { endpoint: endpoint.to_string(), reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(AnnexError::SparqlError {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}", resp.status()),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| AnnexError::SparqlError { endpoint: endpoint.to_string(), reason: e.to_string() })
    }

    async fn try_post(&self, endpoint: &str, query: &str) -> AnnexResult<Value> {
        let resp = self
            .client
            .post(endpoint)
            .form(&[("query", query), ("format", "application/sparql-results+json")])
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| AnnexError::SparqlError { endpoint: endpoint.to_string(), reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(AnnexError::SparqlError {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {} (POST fallback)", resp.status()),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| AnnexError::SparqlError { endpoint: endpoint.to_string(), reason: e.to_string() })
    }
}

fn bindings(body: &Value) -> Vec<&Value> {
    body.get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(|b| b.as_array())
        .map(|arr| arr.iter().collect())
        .unwrap_or_default()
}

fn binding_str<'a>(binding: &'a Value, key: &str) -> Option<&'a str> {
    binding.get(key).and_then(|v| v.get("value")).and_then(|v| v.as_str())
}

fn parse_metadata(body: &Value) -> Option<SparqlMetadata> {
    let rows = bindings(body);
    if rows.is_empty() {
        return None;
    }

    let mut meta = SparqlMetadata {
        title: binding_str(rows[0], "title").map(str::to_string),
        date: binding_str(rows[0], "date").map(str::to_string),
        version: binding_str(rows[0], "version").map(str::to_string),
        items: Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    for row in &rows {
        if let Some(url) = binding_str(row, "item") {
            if !seen.insert(url.to_string()) {
                continue;
            }
            let format = binding_str(row, "format").map(ItemFormat::from_cdm).unwrap_or(ItemFormat::Other);
            meta.items.push(ManifestationItem { url: url.to_string(), format });
        }
    }

    Some(meta)
}

fn parse_consolidated_candidates(body: &Value) -> Vec<(String, Option<NaiveDate>)> {
    bindings(body)
        .into_iter()
        .filter_map(|row| {
            let celex = binding_str(row, "celex")?.to_string();
            let date = binding_str(row, "date").and_then(parse_date);
            Some((celex, date))
        })
        .collect()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&raw[..raw.len().min(10)], "%Y-%m-%d").ok()
}

/// Given a base CELEX (`32024R1689`), returns the consolidated-form prefix
/// (`02024R1689`) by replacing the leading sector digit `3` with `0`.
pub fn consolidated_prefix(base_celex: &str) -> String {
    if let Some(rest) = base_celex.strip_prefix('3') {
        format!("0{rest}")
    } else {
        base_celex.to_string()
    }
}

/// Extracts a `YYYY-MM-DD` date from a consolidated CELEX's `-YYYYMMDD`
/// suffix, for use when the SPARQL endpoint didn't supply a date.
pub fn date_from_consolidated_suffix(celex: &str) -> Option<NaiveDate> {
    let caps = CONSOLIDATED_SUFFIX.captures(celex)?;
    NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()
}

fn pick_latest_consolidated(
    candidates: Vec<(String, Option<NaiveDate>)>,
) -> Option<(String, Option<NaiveDate>)> {
    candidates.into_iter().max_by(|a, b| {
        let date_a = a.1.or_else(|| date_from_consolidated_suffix(&a.0));
        let date_b = b.1.or_else(|| date_from_consolidated_suffix(&b.0));
        date_a.cmp(&date_b).then_with(|| a.0.cmp(&b.0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidated_prefix_swaps_sector_digit() {
        assert_eq!(consolidated_prefix("32024R1689"), "02024R1689");
    }

    #[test]
    fn date_from_suffix_parses_yyyymmdd() {
        assert_eq!(
            date_from_consolidated_suffix("02024R1689-20240613"),
            NaiveDate::from_ymd_opt(2024, 6, 13)
        );
        assert_eq!(date_from_consolidated_suffix("02024R1689"), None);
    }

    #[test]
    fn picks_latest_by_date_then_lexicographic_tiebreak() {
        let candidates = vec![
            ("02024R1689-20240101".to_string(), None),
            ("02024R1689-20240613".to_string(), None),
            ("02024R1689-20240613".to_string(), None),
        ];
        let picked = pick_latest_consolidated(candidates).unwrap();
        assert_eq!(picked.0, "02024R1689-20240613");
    }

    #[test]
    fn parse_metadata_collects_distinct_items_across_rows() {
        let body: Value = serde_json::from_str(
            r#"{"results":{"bindings":[
                {"title":{"value":"AI Act"},"date":{"value":"2024-06-13"},"item":{"value":"https://x/doc.pdf"},"format":{"value":"PDF"}},
                {"title":{"value":"AI Act"},"date":{"value":"2024-06-13"},"item":{"value":"https://x/doc.html"},"format":{"value":"HTML"}}
            ]}}"#,
        )
        .unwrap();
        let meta = parse_metadata(&body).unwrap();
        assert_eq!(meta.title.as_deref(), Some("AI Act"));
        assert_eq!(meta.items.len(), 2);
        assert_eq!(meta.items[0].format, ItemFormat::Pdf);
        assert_eq!(meta.items[1].format, ItemFormat::Html);
    }

    #[test]
    fn parse_metadata_returns_none_for_empty_bindings() {
        let body: Value = serde_json::from_str(r#"{"results":{"bindings":[]}}"#).unwrap();
        assert!(parse_metadata(&body).is_none());
    }
}
