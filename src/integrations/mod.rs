//! External Integrations
//!
//! Adapters between the change tracker and the outside world.
//!
//! # Overview
//!
//! The bridge pulls issue snapshots from an [`IssueSource`] and pushes
//! classified events to an [`EventSink`]. Both are traits so the daemon can be
//! driven by in-memory fakes in tests.
//!
//! # Built-in Integrations
//!
//! - **Jira**: REST search with `expand=changelog` ([`JiraClient`])
//! - **PubSub**: JSON POST per event to a routed target ([`PubSubPublisher`])
//! - **Log**: debug-mode sink that only logs events ([`LogSink`])
//!
//! # Failure Handling
//!
//! A failed fetch is an empty cycle; a failed publish drops that one event.
//! Neither touches the watermarks.

pub mod jira;
pub mod pubsub;
pub mod retry;

use crate::event::Event;
use crate::Result;
use async_trait::async_trait;
use jira_snapshot::IssueSnapshot;

pub use jira::{JiraClient, JiraCredentials};
pub use pubsub::{LogSink, PubSubPublisher};

/// Where issue snapshots come from
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetch the current set of recently active issues
    async fn fetch(&self) -> Result<Vec<IssueSnapshot>>;

    /// Name used in logs and metrics
    fn name(&self) -> &str;
}

/// Where classified events go
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event
    async fn publish(&self, event: &Event) -> Result<()>;

    /// Name used in logs and metrics
    fn name(&self) -> &str;
}
