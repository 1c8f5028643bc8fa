//! PubSub delivery
//!
//! Each event is POSTed as JSON to the target its route template renders.
//! Delivery is fire-and-forget from the daemon's point of view: an error is
//! returned to the caller, which logs and drops the event.

use super::EventSink;
use crate::event::Event;
use crate::routing::RouteTemplate;
use crate::{BridgeError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Default per-request timeout for a publish
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP publisher for classified events
pub struct PubSubPublisher {
    client: Client,
    route: RouteTemplate,
    timeout: Duration,
}

impl PubSubPublisher {
    /// Create a publisher for an already validated route
    pub fn new(route: RouteTemplate) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jira-pubsub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            route,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn route(&self) -> &RouteTemplate {
        &self.route
    }
}

#[async_trait]
impl EventSink for PubSubPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let target = self.route.render(event)?;
        debug!(key = %event.key, action = event.kind(), target = %target, "Publishing event");

        let response = self
            .client
            .post(target.clone())
            .json(event)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(BridgeError::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::Integration(format!(
            "Publish to {} failed: HTTP {}: {}",
            target, status, body
        )))
    }

    fn name(&self) -> &str {
        "pubsub"
    }
}

/// Sink that only logs events, used in debug mode
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(
            key = %event.key,
            action = event.kind(),
            author = %event.author,
            "{} {}",
            event.author,
            event.action_human_text
        );
        debug!(payload = %payload, "Event payload");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
