//! RSS/Atom source processing. Ported from
//! `original_source/annex4parser/regulation_monitor_v2.py`'s
//! `_process_rss_source`/`_create_rss_alert`.

use crate::{record_log, SourceOutcome};
use annex4_alerts::AlertEmitter;
use annex4_core::{sha256_hex, AlertPriority, AnnexResult, LogStatus, RegulationStore, Source};
use annex4_fetch::RssReader;
use std::time::Instant;
use tracing::info;

/// Each unseen entry gets its own `rss_item` log row (so
/// `seen_content_hashes` can dedup future runs entry-by-entry); the feed
/// envelope itself is logged once as `rss_feed`.
pub async fn process_rss_source<S: RegulationStore + ?Sized>(
    source: &Source,
    rss: &RssReader,
    store: &S,
    emitter: &AlertEmitter,
) -> AnnexResult<SourceOutcome> {
    let started = Instant::now();
    let entries = rss.fetch_feed(&source.url).await?;
    let seen = store.seen_content_hashes(&source.id).await?;

    let mut new_count = 0usize;
    for entry in &entries {
        if seen.contains(&entry.content_hash) {
            continue;
        }
        new_count += 1;
        emitter
            .emit_rss_update(&source.id, &entry.title, &entry.link, AlertPriority::Medium)
            .await;
        info!(source_id = %source.id, link = %entry.link, "rss_item");
        record_log(
            store,
            &source.id,
            LogStatus::Success,
            Some(entry.content_hash.clone()),
            None,
            None,
            Some(entry.title.len() as i64),
            Some("rss_item".to_string()),
        )
        .await?;
    }

    let feed_hash = sha256_hex(
        &entries
            .iter()
            .map(|e| e.content_hash.as_str())
            .collect::<Vec<_>>()
            .join(","),
    );
    info!(source_id = %source.id, entries = entries.len(), new_count, "rss_feed");
    record_log(
        store,
        &source.id,
        LogStatus::Success,
        Some(feed_hash),
        Some(started.elapsed().as_millis() as i64),
        None,
        Some(entries.len() as i64),
        Some("rss_feed".to_string()),
    )
    .await?;

    if new_count == 0 {
        Ok(SourceOutcome::Unchanged)
    } else {
        Ok(SourceOutcome::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_hash_is_stable_for_the_same_entry_set() {
        let hashes = vec!["a".to_string(), "b".to_string()];
        let first = sha256_hex(&hashes.join(","));
        let second = sha256_hex(&hashes.join(","));
        assert_eq!(first, second);
    }
}
