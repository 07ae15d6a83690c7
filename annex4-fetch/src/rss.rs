//! RSS/Atom feed reader. Grounded on
//! `original_source/annex4parser/rss_listener.py`: each entry's
//! `content_hash` is `sha256("{link}:{title}")`, letting the monitor
//! deduplicate against `RegulationSourceLog.content_hash` without keeping a
//! separate seen-set.

use crate::backoff;
use annex4_core::{sha256_hex, AnnexError, AnnexResult};
use reqwest::Client;
use roxmltree::Document;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssEntry {
    pub link: String,
    pub content_hash: String,
    pub title: String,
}

pub struct RssReader {
    client: Client,
    user_agent: String,
}

impl RssReader {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            user_agent: user_agent.into(),
        }
    }

    /// Fetches and parses a feed, retrying transport failures with the
    /// shared exponential-jitter backoff policy.
    pub async fn fetch_feed(&self, url: &str) -> AnnexResult<Vec<RssEntry>> {
        let body = self.fetch_with_retry(url).await?;
        Ok(parse_feed(&body))
    }

    async fn fetch_with_retry(&self, url: &str) -> AnnexResult<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_fetch(url).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if attempt >= backoff::MAX_ATTEMPTS {
                        return Err(err);
                    }
                    let wait = backoff::duration_for_attempt(attempt);
                    warn!(url, attempt, ?wait, "retrying rss fetch after error");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> AnnexResult<String> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| AnnexError::Transport { url: url.to_string(), reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(AnnexError::Transport { url: url.to_string(), reason: format!("HTTP {}", resp.status()) });
        }
        resp.text().await.map_err(|e| AnnexError::Transport { url: url.to_string(), reason: e.to_string() })
    }
}

/// Parses RSS 2.0 `<item>` and Atom `<entry>` elements into `(link, hash,
/// title)` tuples. Malformed XML yields an empty list rather than an error
/// -- the monitor logs the fetch as a parse failure and moves on.
fn parse_feed(xml: &str) -> Vec<RssEntry> {
    let doc = match Document::parse(xml) {
        Ok(d) => d,
        Err(e) => {
            debug!(error = %e, "failed to parse rss/atom xml");
            return Vec::new();
        }
    };

    doc.descendants()
        .filter(|n| n.has_tag_name("item") || n.has_tag_name("entry"))
        .filter_map(|item| {
            let link = item
                .children()
                .find(|n| n.has_tag_name("link"))
                .and_then(|n| n.text().map(str::to_string).filter(|s| !s.trim().is_empty()).or_else(|| n.attribute("href").map(str::to_string)))
                .unwrap_or_default();
            if link.trim().is_empty() {
                return None;
            }
            let title = item
                .children()
                .find(|n| n.has_tag_name("title"))
                .and_then(|n| n.text())
                .unwrap_or("")
                .trim()
                .to_string();
            let content_hash = sha256_hex(&format!("{link}:{title}"));
            Some(RssEntry { link, content_hash, title })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
    <rss version="2.0"><channel>
      <item><title>New AI Regulation Published</title><link>https://eur-lex.europa.eu/32024R1689</link></item>
      <item><title>Consultation Opened</title><link>https://eur-lex.europa.eu/consult</link></item>
    </channel></rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0"?>
    <feed xmlns="http://www.w3.org/2005/Atom">
      <entry><title>Update</title><link href="https://example.org/update"/></entry>
    </feed>"#;

    #[test]
    fn parses_rss_items_into_entries() {
        let entries = parse_feed(RSS_SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://eur-lex.europa.eu/32024R1689");
        assert_eq!(entries[0].title, "New AI Regulation Published");
    }

    #[test]
    fn content_hash_is_derived_from_link_and_title() {
        let entries = parse_feed(RSS_SAMPLE);
        let expected = sha256_hex("https://eur-lex.europa.eu/32024R1689:New AI Regulation Published");
        assert_eq!(entries[0].content_hash, expected);
    }

    #[test]
    fn parses_atom_entries_with_href_link() {
        let entries = parse_feed(ATOM_SAMPLE);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.org/update");
    }

    #[test]
    fn malformed_xml_yields_empty_list() {
        assert!(parse_feed("not xml at all <<<").is_empty());
    }

    #[test]
    fn entries_without_a_link_are_skipped() {
        let xml = r#"<rss><channel><item><title>No link here</title></item></channel></rss>"#;
        assert!(parse_feed(xml).is_empty());
    }
}
