//! Raw HTML/press-page source processing. Ported from
//! `original_source/annex4parser/regulation_monitor_v2.py`'s
//! `_process_html_source`.

use crate::celex::extract_celex_id;
use crate::{record_log, SourceOutcome};
use annex4_alerts::AlertEmitter;
use annex4_core::{sha256_hex, AnnexResult, LogStatus, RegulationStore, Source};
use annex4_fetch::{Fetcher, TextExtractor};
use annex4_ingest::IngestRequest;
use annex4_text::sanitize_content;
use chrono::Utc;
use std::time::Instant;
use tracing::info;

pub async fn process_html_source<S: RegulationStore + ?Sized>(
    source: &Source,
    fetcher: &Fetcher,
    extractor: &dyn TextExtractor,
    store: &S,
    emitter: &AlertEmitter,
) -> AnnexResult<SourceOutcome> {
    let started = Instant::now();
    let Some(body) = fetcher.fetch(&source.url).await else {
        record_log(
            store,
            &source.id,
            LogStatus::Error,
            None,
            Some(started.elapsed().as_millis() as i64),
            Some("fetch blocked by robots or exhausted retries".to_string()),
            None,
            None,
        )
        .await?;
        return Ok(SourceOutcome::Skipped);
    };

    let extracted = extractor.extract(body.as_bytes(), Some("text/html")).await;
    let text = if extracted.is_empty() { body } else { extracted };
    let clean_text = sanitize_content(&text);
    let content_hash = sha256_hex(&clean_text);
    let elapsed_ms = started.elapsed().as_millis() as i64;

    if let Some(previous_hash) = store.last_successful_hash(&source.id).await? {
        if previous_hash == content_hash {
            info!(source_id = %source.id, "html source unchanged");
            record_log(
                store,
                &source.id,
                LogStatus::Success,
                Some(content_hash),
                Some(elapsed_ms),
                None,
                Some(clean_text.len() as i64),
                Some("html".to_string()),
            )
            .await?;
            return Ok(SourceOutcome::Unchanged);
        }
    }

    let celex_id = source
        .extra_str("celex_id")
        .map(str::to_string)
        .or_else(|| extract_celex_id(&source.url))
        .unwrap_or_else(|| source.id.clone());

    let name = source.extra_str("name").unwrap_or(&source.id).to_string();
    let version = Utc::now().format("%Y-%m-%d").to_string();

    let request = IngestRequest::new(name, version, text, source.url.clone(), celex_id);
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

    info!(source_id = %source.id, "html source ingested");
    record_log(
        store,
        &source.id,
        LogStatus::Success,
        Some(content_hash),
        Some(elapsed_ms),
        None,
        Some(clean_text.len() as i64),
        Some("html".to_string()),
    )
    .await?;
    Ok(SourceOutcome::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_derived_from_sanitized_text() {
        let a = sanitize_content("Article 1\nSubject matter");
        let b = sanitize_content("Article 1\nSubject matter");
        assert_eq!(sha256_hex(&a), sha256_hex(&b));
    }
}
