//! Top-level orchestration: loads due Sources, fans them out under
//! `tokio::task::JoinSet`, and aggregates per-type counters. Grounded on
//! `original_source/annex4parser/regulation_monitor_v2.py`'s
//! `RegulationMonitorV2.update_all`/`update_by_type`.

use crate::schedule::filter_due;
use crate::{eli, html_source, rss_source, record_log, SourceOutcome};
use annex4_alerts::AlertEmitter;
use annex4_core::{AnnexResult, LogStatus, RegulationStore, Source, SourceType};
use annex4_fetch::{Fetcher, NaiveHtmlTextExtractor, RssReader, SparqlClient, TextExtractor, DEFAULT_USER_AGENT};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

/// Aggregate result of one `update_all`/`update_by_type` run. Mirrors
/// spec.md §4.10's `{eli_sparql, rss, html, errors, total}` counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub eli_sparql: usize,
    pub rss: usize,
    pub html: usize,
    pub errors: usize,
    pub total: usize,
}

/// Runs the per-source fetch/hash/ingest state machine across all active
/// Sources, one concurrent task per Source, under a single shared HTTP
/// client configured with the bot User-Agent. Holds no state of its own
/// between runs beyond what's in the store.
pub struct SourceMonitor {
    store: Arc<dyn RegulationStore>,
    fetcher: Arc<Fetcher>,
    sparql: Arc<SparqlClient>,
    rss: Arc<RssReader>,
    extractor: Arc<dyn TextExtractor>,
    emitter: Arc<AlertEmitter>,
}

impl SourceMonitor {
    pub fn new(store: Arc<dyn RegulationStore>, emitter: Arc<AlertEmitter>, user_agent: Option<String>) -> Self {
        let user_agent = user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Self {
            store,
            fetcher: Arc::new(Fetcher::new(Some(user_agent.clone()))),
            sparql: Arc::new(SparqlClient::new(user_agent.clone())),
            rss: Arc::new(RssReader::new(user_agent)),
            extractor: Arc::new(NaiveHtmlTextExtractor),
            emitter,
        }
    }

    /// Swaps in a real PDF/HTML text-extraction backend in place of the
    /// naive default.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Loads every active Source due to run and processes it.
    pub async fn update_all(&self) -> AnnexResult<UpdateStats> {
        let sources = self.store.active_sources().await?;
        self.run_sources(filter_due(sources, Utc::now())).await
    }

    /// Loads active Sources of one type due to run. Used by the
    /// scheduler's per-cadence jobs (ELI every 6h, RSS every 1h, HTML
    /// every 24h by default; see `schedule::default_frequency_for`).
    pub async fn update_by_type(&self, source_type: SourceType) -> AnnexResult<UpdateStats> {
        let sources = self.store.active_sources_of_type(source_type).await?;
        self.run_sources(filter_due(sources, Utc::now())).await
    }

    async fn run_sources(&self, sources: Vec<Source>) -> AnnexResult<UpdateStats> {
        let mut set = JoinSet::new();

        for source in sources {
            let store = self.store.clone();
            let fetcher = self.fetcher.clone();
            let sparql = self.sparql.clone();
            let rss = self.rss.clone();
            let extractor = self.extractor.clone();
            let emitter = self.emitter.clone();

            set.spawn(async move {
                let source_type = source.source_type;
                let result = dispatch(&source, &fetcher, &sparql, &rss, extractor.as_ref(), store.as_ref(), &emitter).await;
                (source.id, source_type, result)
            });
        }

        let mut stats = UpdateStats::default();
        while let Some(joined) = set.join_next().await {
            stats.total += 1;
            match joined {
                Ok((source_id, source_type, result)) => {
                    bump_type_counter(&mut stats, source_type);
                    if let Err(err) = result {
                        stats.errors += 1;
                        warn!(source_id, error = %err, "source processing failed");
                        if let Err(log_err) =
                            record_log(self.store.as_ref(), &source_id, LogStatus::Error, None, None, Some(err.to_string()), None, None).await
                        {
                            warn!(source_id, error = %log_err, "failed to record error log");
                        }
                    }
                }
                Err(join_err) => {
                    stats.errors += 1;
                    warn!(error = %join_err, "source task panicked or was cancelled");
                }
            }
        }

        Ok(stats)
    }
}

fn bump_type_counter(stats: &mut UpdateStats, source_type: SourceType) {
    match source_type {
        SourceType::EliSparql => stats.eli_sparql += 1,
        SourceType::Rss => stats.rss += 1,
        SourceType::Html | SourceType::PressApi => stats.html += 1,
    }
}

async fn dispatch<S: RegulationStore + ?Sized>(
    source: &Source,
    fetcher: &Fetcher,
    sparql: &SparqlClient,
    rss: &RssReader,
    extractor: &dyn TextExtractor,
    store: &S,
    emitter: &AlertEmitter,
) -> AnnexResult<SourceOutcome> {
    match source.source_type {
        SourceType::EliSparql => eli::process_eli_source(source, fetcher, sparql, extractor, store, emitter).await,
        SourceType::Rss => rss_source::process_rss_source(source, rss, store, emitter).await,
        SourceType::Html | SourceType::PressApi => {
            html_source::process_html_source(source, fetcher, extractor, store, emitter).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex4_db::InMemoryRegulationStore;
    use std::collections::HashMap;

    fn html_source_fixture(id: &str) -> Source {
        Source {
            id: id.to_string(),
            url: "https://example.org/press".to_string(),
            source_type: SourceType::Html,
            freq: "24h".to_string(),
            active: true,
            last_fetched: None,
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn update_all_with_no_active_sources_returns_zeroed_stats() {
        let store: Arc<dyn RegulationStore> = Arc::new(InMemoryRegulationStore::new());
        let emitter = Arc::new(AlertEmitter::new(None, None));
        let monitor = SourceMonitor::new(store, emitter, Some("test-agent".to_string()));

        let stats = monitor.update_all().await.unwrap();
        assert_eq!(stats, UpdateStats::default());
    }

    #[tokio::test]
    async fn unreachable_source_counts_as_an_error_without_aborting_the_run() {
        let db = InMemoryRegulationStore::new();
        db.seed_source(html_source_fixture("press-1"));
        let store: Arc<dyn RegulationStore> = Arc::new(db);
        let emitter = Arc::new(AlertEmitter::new(None, None));
        let monitor = SourceMonitor::new(store, emitter, Some("test-agent".to_string()));

        let stats = monitor.update_all().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.html, 1);
        assert_eq!(stats.errors, 0);
    }
}
