//! Robots-aware HTTP fetcher with per-host crawl-delay enforcement and
//! retry/backoff.

use crate::backoff::{self, MAX_ATTEMPTS};
use crate::robots::{RobotsPolicy, DEFAULT_USER_AGENT};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

struct HostState {
    robots: Option<RobotsPolicy>,
    last_request: Option<Instant>,
}

/// Fetches URLs honoring `robots.txt` and enforcing one crawl-delay sleep
/// per host between requests. One instance is meant to be shared (behind
/// an `Arc`) across all of a monitor run's source tasks so the per-host
/// serialization actually holds.
pub struct Fetcher {
    client: Client,
    user_agent: String,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl Fetcher {
    pub fn new(user_agent: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches `url`'s body, or `None` if robots disallows it or all
    /// retries are exhausted. Network/5xx errors retry with exponential
    /// jitter backoff; 4xx is terminal.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        self.gate(url).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_fetch(url).await {
                Ok(Some(body)) => return Some(body),
                Ok(None) => return None,
                Err(retryable) => {
                    if !retryable || attempt >= MAX_ATTEMPTS {
                        return None;
                    }
                    let wait = backoff::duration_for_attempt(attempt);
                    warn!(url, attempt, ?wait, "retrying after transport error");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Fetches `url`'s raw bytes (e.g. a PDF manifestation item), honoring
    /// the same robots/crawl-delay/retry policy as [`Fetcher::fetch`].
    pub async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>> {
        self.gate(url).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_fetch_bytes(url).await {
                Ok(Some(body)) => return Some(body),
                Ok(None) => return None,
                Err(retryable) => {
                    if !retryable || attempt >= MAX_ATTEMPTS {
                        return None;
                    }
                    let wait = backoff::duration_for_attempt(attempt);
                    warn!(url, attempt, ?wait, "retrying after transport error");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Resolves robots.txt for `url`'s host and sleeps out any remaining
    /// crawl-delay. Returns `None` if robots disallows the path.
    async fn gate(&self, url: &str) -> Option<()> {
        let host = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.host_str()?.to_string(),
            Err(_) => return None,
        };

        if !self.check_robots_allowed(url, &host).await {
            debug!(url, "blocked by robots.txt");
            return None;
        }

        self.respect_crawl_delay(&host).await;
        Some(())
    }

    /// Returns `Ok(Some(body))` on success, `Ok(None)` on a terminal 4xx,
    /// `Err(true)` for a retryable condition (network error or 5xx).
    async fn try_fetch(&self, url: &str) -> Result<Option<String>, bool> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|_| true)?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map(Some).map_err(|_| true);
        }
        if status.is_server_error() {
            return Err(true);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(true);
        }
        Ok(None)
    }

    async fn try_fetch_bytes(&self, url: &str) -> Result<Option<Vec<u8>>, bool> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|_| true)?;

        let status = response.status();
        if status.is_success() {
            return response.bytes().await.map(|b| Some(b.to_vec())).map_err(|_| true);
        }
        if status.is_server_error() {
            return Err(true);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(true);
        }
        Ok(None)
    }

    async fn check_robots_allowed(&self, url: &str, host: &str) -> bool {
        let policy = self.robots_for_host(host).await;
        let path = reqwest::Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
        policy.is_allowed(&path, &self.user_agent)
    }

    async fn robots_for_host(&self, host: &str) -> RobotsPolicy {
        {
            let hosts = self.hosts.lock().unwrap();
            if let Some(state) = hosts.get(host) {
                if let Some(policy) = &state.robots {
                    return policy.clone();
                }
            }
        }

        let robots_url = format!("https://{host}/robots.txt");
        let policy = match self.client.get(&robots_url).header("User-Agent", &self.user_agent).send().await {
            Ok(resp) if resp.status().is_success() => {
                let text = resp.text().await.unwrap_or_default();
                RobotsPolicy::parse(&text)
            }
            _ => RobotsPolicy::default(),
        };

        let mut hosts = self.hosts.lock().unwrap();
        let entry = hosts.entry(host.to_string()).or_insert_with(|| HostState { robots: None, last_request: None });
        entry.robots = Some(policy.clone());
        policy
    }

    async fn respect_crawl_delay(&self, host: &str) {
        let delay_secs = {
            let hosts = self.hosts.lock().unwrap();
            hosts.get(host).and_then(|s| s.robots.as_ref()).map(|p| p.crawl_delay(&self.user_agent)).unwrap_or(0.0)
        };

        let sleep_for = {
            let mut hosts = self.hosts.lock().unwrap();
            let entry = hosts.entry(host.to_string()).or_insert_with(|| HostState { robots: None, last_request: None });
            let now = Instant::now();
            let wait = entry
                .last_request
                .map(|last| {
                    let elapsed = now.duration_since(last).as_secs_f64();
                    (delay_secs - elapsed).max(0.0)
                })
                .unwrap_or(0.0);
            entry.last_request = Some(now + Duration::from_secs_f64(wait));
            wait
        };

        if sleep_for > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(sleep_for)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_default_user_agent() {
        let fetcher = Fetcher::new(None);
        assert_eq!(fetcher.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn constructs_with_overridden_user_agent() {
        let fetcher = Fetcher::new(Some("CustomBot/1.0".to_string()));
        assert_eq!(fetcher.user_agent, "CustomBot/1.0");
    }
}
