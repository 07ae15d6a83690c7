//! Builds alert payloads and dispatches them to a webhook and/or message
//! bus. Grounded on `original_source/annex4parser/alerts/webhook.py`'s
//! `AlertEmitter`: every payload carries `timestamp` (UTC, RFC 3339 with a
//! `Z` suffix) and `source = "annex4parser"`; emission is fire-and-forget
//! (transport failures are logged, never raised to the caller).
//!
//! The Kafka producer the Python original wraps is outside this corpus's
//! dependency stack (spec.md §1 treats the bus as an external
//! collaborator whose emission contract alone is in scope), so `AlertBus`
//! stands in as a trait with an in-process `tokio::sync::mpsc`-backed
//! implementation.

use annex4_core::AlertPriority;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

pub const SOURCE_TAG: &str = "annex4parser";
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Message-bus transport seam. A real deployment would implement this over
/// a Kafka producer; `ChannelAlertBus` is the in-process stand-in used by
/// tests and single-process deployments.
#[async_trait]
pub trait AlertBus: Send + Sync {
    async fn publish(&self, key: &str, payload: Value);
}

/// `tokio::sync::mpsc`-backed `AlertBus`. Cloning the sender is cheap, so
/// many concurrent ingestion tasks can hold one without contention.
pub struct ChannelAlertBus {
    sender: mpsc::UnboundedSender<(String, Value)>,
}

impl ChannelAlertBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, Value)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl AlertBus for ChannelAlertBus {
    async fn publish(&self, key: &str, payload: Value) {
        if self.sender.send((key.to_string(), payload)).is_err() {
            warn!("alert bus has no receiver, message discarded");
        }
    }
}

/// Fire-and-forget alert dispatcher. Safe to call from any concurrent
/// task: the webhook client and bus handle are both `Send + Sync`, and
/// every public method borrows `&self`.
pub struct AlertEmitter {
    webhook_url: Option<String>,
    bus: Option<Arc<dyn AlertBus>>,
    client: Client,
}

impl AlertEmitter {
    pub fn new(webhook_url: Option<String>, bus: Option<Arc<dyn AlertBus>>) -> Self {
        Self {
            webhook_url,
            bus,
            client: Client::builder()
                .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
        }
    }

    pub fn webhook_only(webhook_url: impl Into<String>) -> Self {
        Self::new(Some(webhook_url.into()), None)
    }

    pub fn bus_only(bus: Arc<dyn AlertBus>) -> Self {
        Self::new(None, Some(bus))
    }

    pub async fn emit_rule_changed(
        &self,
        rule_id: &str,
        severity: &str,
        regulation_name: &str,
        section_code: &str,
        change_type: &str,
    ) {
        let payload = json!({
            "rule_id": rule_id,
            "severity": severity,
            "regulation_name": regulation_name,
            "section_code": section_code,
            "change_type": change_type,
            "timestamp": timestamp(),
            "source": SOURCE_TAG,
        });
        self.dispatch(rule_id, payload).await;
    }

    pub async fn emit_rss_update(&self, source_id: &str, title: &str, link: &str, priority: AlertPriority) {
        let payload = json!({
            "source_id": source_id,
            "title": title,
            "link": link,
            "priority": priority_str(priority),
            "type": "rss_update",
            "timestamp": timestamp(),
            "source": SOURCE_TAG,
        });
        self.dispatch(source_id, payload).await;
    }

    pub async fn emit_regulation_update(
        &self,
        regulation_id: &str,
        regulation_name: &str,
        version: &str,
        source_url: &str,
        rules_count: usize,
    ) {
        let payload = json!({
            "regulation_id": regulation_id,
            "regulation_name": regulation_name,
            "version": version,
            "source_url": source_url,
            "rules_count": rules_count,
            "type": "regulation_update",
            "timestamp": timestamp(),
            "source": SOURCE_TAG,
        });
        self.dispatch(regulation_id, payload).await;
    }

    async fn dispatch(&self, key: &str, payload: Value) {
        if let Some(bus) = &self.bus {
            bus.publish(key, payload.clone()).await;
        }
        if let Some(url) = &self.webhook_url {
            self.send_webhook(url, payload).await;
        }
    }

    async fn send_webhook(&self, url: &str, payload: Value) {
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(url, status = %resp.status(), "webhook delivery failed");
            }
            Err(e) => {
                warn!(url, error = %e, "webhook delivery failed");
            }
            _ => {}
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn priority_str(priority: AlertPriority) -> &'static str {
    match priority {
        AlertPriority::Urgent => "urgent",
        AlertPriority::High => "high",
        AlertPriority::Medium => "medium",
        AlertPriority::Low => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rule_changed_payload_carries_required_fields_over_the_bus() {
        let (bus, mut rx) = ChannelAlertBus::new();
        let emitter = AlertEmitter::bus_only(Arc::new(bus));

        emitter.emit_rule_changed("rule-1", "high", "AI Act", "Article9.2", "modification").await;

        let (key, payload) = rx.recv().await.unwrap();
        assert_eq!(key, "rule-1");
        assert_eq!(payload["severity"], "high");
        assert_eq!(payload["section_code"], "Article9.2");
        assert_eq!(payload["source"], SOURCE_TAG);
        assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn rss_update_payload_has_type_tag_and_priority() {
        let (bus, mut rx) = ChannelAlertBus::new();
        let emitter = AlertEmitter::bus_only(Arc::new(bus));

        emitter
            .emit_rss_update("ep_plenary", "New AI Regulation Published", "https://example.org", AlertPriority::Medium)
            .await;

        let (_, payload) = rx.recv().await.unwrap();
        assert_eq!(payload["type"], "rss_update");
        assert_eq!(payload["priority"], "medium");
    }

    #[tokio::test]
    async fn regulation_update_payload_carries_rules_count() {
        let (bus, mut rx) = ChannelAlertBus::new();
        let emitter = AlertEmitter::bus_only(Arc::new(bus));

        emitter.emit_regulation_update("reg-1", "AI Act", "2024-06-13", "https://eur-lex.europa.eu/", 42).await;

        let (_, payload) = rx.recv().await.unwrap();
        assert_eq!(payload["type"], "regulation_update");
        assert_eq!(payload["rules_count"], 42);
    }

    #[tokio::test]
    async fn emitting_with_no_transports_configured_never_panics() {
        let emitter = AlertEmitter::new(None, None);
        emitter.emit_rule_changed("rule-1", "low", "AI Act", "Article1", "no_change").await;
    }

    #[test]
    fn priority_strings_match_payload_vocabulary() {
        assert_eq!(priority_str(AlertPriority::Urgent), "urgent");
        assert_eq!(priority_str(AlertPriority::High), "high");
        assert_eq!(priority_str(AlertPriority::Medium), "medium");
        assert_eq!(priority_str(AlertPriority::Low), "low");
    }
}
