//! ELI/SPARQL source processing. Ported from
//! `original_source/annex4parser/regulation_monitor_v2.py`'s
//! `_process_eli_source`.

use crate::celex::{extract_celex_id, stable_oj_url};
use crate::{record_log, SourceOutcome};
use annex4_alerts::AlertEmitter;
use annex4_core::{sha256_hex, AnnexResult, LogStatus, RegulationStore, Source};
use annex4_fetch::{Fetcher, ItemFormat, SparqlClient, TextExtractor};
use annex4_ingest::IngestRequest;
use annex4_text::sanitize_content;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://publications.europa.eu/webapi/rdf/sparql";

/// Extracted text is treated as too thin to ingest below this length; the
/// engine falls back to the next available manifestation item.
const MIN_USABLE_TEXT_LEN: usize = 300;

pub async fn process_eli_source<S: RegulationStore + ?Sized>(
    source: &Source,
    fetcher: &Fetcher,
    sparql: &SparqlClient,
    extractor: &dyn TextExtractor,
    store: &S,
    emitter: &AlertEmitter,
) -> AnnexResult<SourceOutcome> {
    let started = Instant::now();
    let endpoint = source.extra_str("endpoint").unwrap_or(DEFAULT_SPARQL_ENDPOINT);

    let Some(mut celex_id) = source
        .extra_str("celex_id")
        .map(str::to_string)
        .or_else(|| extract_celex_id(&source.url))
    else {
        warn!(source_id = %source.id, "eli source has no resolvable celex id");
        skip(store, &source.id, started, "no resolvable celex id").await?;
        return Ok(SourceOutcome::Skipped);
    };

    let mut work_date: Option<DateTime<Utc>> = None;

    if source.extra_bool("consolidated") {
        if let Some((resolved, date)) = sparql.resolve_latest_consolidated(endpoint, &celex_id).await? {
            let date = date.or_else(|| annex4_fetch::sparql::date_from_consolidated_suffix(&resolved));
            if let Some(date) = date {
                work_date = Some(date_to_utc(date));
            }
            celex_id = resolved;
        }
    }

    let metadata = sparql.fetch_latest(endpoint, &celex_id).await?;

    let (text, fetch_mode, source_url) = match &metadata {
        None => {
            let url = stable_oj_url(&celex_id);
            let Some(body) = fetcher.fetch(&url).await else {
                skip(store, &source.id, started, "sparql returned nothing and OJ fallback fetch failed").await?;
                return Ok(SourceOutcome::Skipped);
            };
            (body, "html_fallback", url)
        }
        Some(meta) => {
            let pdf_item = meta.items.iter().find(|i| i.format == ItemFormat::Pdf);
            let mut resolved = None;

            if let Some(item) = pdf_item {
                if let Some(bytes) = fetcher.fetch_bytes(&item.url).await {
                    let extracted = extractor.extract(&bytes, Some("application/pdf")).await;
                    if extracted.len() >= MIN_USABLE_TEXT_LEN {
                        resolved = Some((extracted, "sparql_item", item.url.clone()));
                    }
                }
            }

            if resolved.is_none() {
                if let Some(item) = meta.items.iter().find(|i| i.format == ItemFormat::Html) {
                    if let Some(body) = fetcher.fetch(&item.url).await {
                        let extracted = extractor.extract(body.as_bytes(), Some("text/html")).await;
                        let body = if extracted.is_empty() { body } else { extracted };
                        resolved = Some((body, "sparql_meta_html_text", item.url.clone()));
                    }
                }
            }

            match resolved {
                Some(r) => r,
                None => {
                    let url = stable_oj_url(&celex_id);
                    let Some(body) = fetcher.fetch(&url).await else {
                        skip(store, &source.id, started, "no usable manifestation item and OJ fallback fetch failed").await?;
                        return Ok(SourceOutcome::Skipped);
                    };
                    (body, "html_fallback", url)
                }
            }
        }
    };

    let clean_text = sanitize_content(&text);
    let content_hash = sha256_hex(&clean_text);
    let elapsed_ms = started.elapsed().as_millis() as i64;

    if let Some(previous_hash) = store.last_successful_hash(&source.id).await? {
        if previous_hash == content_hash {
            info!(source_id = %source.id, celex_id, fetch_mode, "eli source unchanged");
            record_log(
                store,
                &source.id,
                LogStatus::Success,
                Some(content_hash),
                Some(elapsed_ms),
                None,
                Some(clean_text.len() as i64),
                Some(fetch_mode.to_string()),
            )
            .await?;
            return Ok(SourceOutcome::Unchanged);
        }
    }

    let name = metadata
        .as_ref()
        .and_then(|m| m.title.clone())
        .unwrap_or_else(|| celex_id.clone());
    let version = metadata
        .as_ref()
        .and_then(|m| m.version.clone())
        .or_else(|| metadata.as_ref().and_then(|m| m.date.clone()))
        .unwrap_or_else(|| celex_id.clone());

    let mut request = IngestRequest::new(name, version, text, source_url, celex_id.clone());
    if let Some(date) = work_date {
        request = request.with_work_date(date);
    }

    let regulation = annex4_ingest::ingest(store, emitter, request).await?;
    let rules_count = store.rules_for_regulation(regulation.id).await?.len();
    emitter
        .emit_regulation_update(
            &regulation.id.to_string(),
            &regulation.name,
            &regulation.version,
            regulation.source_url.as_deref().unwrap_or_default(),
            rules_count,
        )
        .await;

    info!(source_id = %source.id, celex_id, fetch_mode, "eli source ingested");
    record_log(
        store,
        &source.id,
        LogStatus::Success,
        Some(content_hash),
        Some(elapsed_ms),
        None,
        Some(clean_text.len() as i64),
        Some(fetch_mode.to_string()),
    )
    .await?;
    Ok(SourceOutcome::Processed)
}

async fn skip<S: RegulationStore + ?Sized>(
    store: &S,
    source_id: &str,
    started: Instant,
    reason: &str,
) -> AnnexResult<()> {
    record_log(
        store,
        source_id,
        LogStatus::Error,
        None,
        Some(started.elapsed().as_millis() as i64),
        Some(reason.to_string()),
        None,
        None,
    )
    .await
}

fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_matches_eur_lex_cellar() {
        assert_eq!(DEFAULT_SPARQL_ENDPOINT, "https://publications.europa.eu/webapi/rdf/sparql");
    }
}
