use crate::cache;
use crate::utils::{print_error, print_info, print_success};
use annex4_alerts::AlertEmitter;
use annex4_core::{AnnexError, AnnexResult, RegulationStore};
use annex4_db::PostgresRegulationStore;
use annex4_fetch::Fetcher;
use annex4_ingest::IngestRequest;
use annex4_monitor::SourceMonitor;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn resolve_db_url(flag: Option<String>) -> AnnexResult<String> {
    flag.or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| AnnexError::ConfigurationError {
            parameter: "db-url".to_string(),
            reason: "neither --db-url nor DATABASE_URL is set".to_string(),
        })
}

async fn connect(db_url: &str) -> AnnexResult<PostgresRegulationStore> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|e| AnnexError::DatabaseError {
            operation: "connect".to_string(),
            reason: e.to_string(),
        })?;
    let store = PostgresRegulationStore::new(pool);
    store.initialize().await?;
    Ok(store)
}

/// `update-single --name --version --url [--db-url] [--cache-dir] [--verbose]`
/// — single-URL ingest via the V1 path: fetch, check the on-disk cache,
/// sanitize and ingest through `annex4-ingest` directly, bypassing the
/// source-monitor state machine entirely.
#[derive(Args, Debug)]
pub struct UpdateSingleCommand {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub version: String,
    #[arg(long)]
    pub url: String,
    #[arg(long = "db-url")]
    pub db_url: Option<String>,
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,
    #[arg(long = "webhook-url")]
    pub webhook_url: Option<String>,
    #[arg(long, short)]
    pub verbose: bool,
}

impl UpdateSingleCommand {
    pub async fn execute(self) -> AnnexResult<()> {
        let db_url = resolve_db_url(self.db_url)?;
        let store = connect(&db_url).await?;

        let text = match &self.cache_dir {
            Some(dir) => match cache::get_cached_text(dir, &self.url) {
                Some(cached) => {
                    info!(url = %self.url, "using cached text");
                    cached
                }
                None => self.fetch_and_cache(dir).await?,
            },
            None => self.fetch(&Fetcher::new(None)).await?,
        };

        let celex_id = annex4_monitor::extract_celex_id(&self.url).unwrap_or_else(|| self.name.clone());
        let emitter = AlertEmitter::new(self.webhook_url.clone(), None);
        let request = IngestRequest::new(self.name.clone(), self.version.clone(), text, self.url.clone(), celex_id);
        let regulation = annex4_ingest::ingest(&store, &emitter, request).await?;

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

        print_success(&format!(
            "ingested {} v{} ({})",
            regulation.name, regulation.version, regulation.celex_id
        ));
        Ok(())
    }

    async fn fetch(&self, fetcher: &Fetcher) -> AnnexResult<String> {
        fetcher.fetch(&self.url).await.ok_or_else(|| AnnexError::Transport {
            url: self.url.clone(),
            reason: "fetch returned no content".to_string(),
        })
    }

    async fn fetch_and_cache(&self, cache_dir: &std::path::Path) -> AnnexResult<String> {
        let text = self.fetch(&Fetcher::new(None)).await?;
        cache::save_cached_text(cache_dir, &self.url, &text);
        Ok(text)
    }
}

/// `update-all --db-url --config --verbose` — one sweep of all active
/// sources via the V2 monitor.
#[derive(Args, Debug)]
pub struct UpdateAllCommand {
    #[arg(long = "db-url")]
    pub db_url: Option<String>,
    #[arg(long)]
    pub config: PathBuf,
    #[arg(long, short)]
    pub verbose: bool,
    #[arg(long = "webhook-url")]
    pub webhook_url: Option<String>,
}

impl UpdateAllCommand {
    pub async fn execute(self) -> AnnexResult<()> {
        let db_url = resolve_db_url(self.db_url)?;
        let store = connect(&db_url).await?;
        let config = crate::config::SourceConfig::load(&self.config)?;
        config.sync_into(&store).await?;

        let emitter = Arc::new(AlertEmitter::new(self.webhook_url, None));
        let monitor = SourceMonitor::new(Arc::new(store), emitter, None);
        let stats = monitor.update_all().await?;

        print_info(&format!(
            "eli_sparql={} rss={} html={} errors={} total={}",
            stats.eli_sparql, stats.rss, stats.html, stats.errors, stats.total
        ));
        if stats.errors > 0 {
            print_error(&format!("{} source(s) failed this sweep", stats.errors));
        } else {
            print_success("sweep completed with no source errors");
        }
        Ok(())
    }
}
