//! Bridge daemon
//!
//! Long-running process that turns Jira activity into pubsub events.
//!
//! # Architecture
//!
//! ## Poll Cycle
//!
//! 1. **Fetch**: ask the [`IssueSource`](crate::integrations::IssueSource)
//!    for recently updated issues (with in-cycle retries)
//! 2. **Track**: run every snapshot through the
//!    [`ChangeTracker`](crate::tracker::ChangeTracker) against the watermarks
//! 3. **Publish**: hand each event to the
//!    [`EventSink`](crate::integrations::EventSink), in order
//! 4. **Persist**: save watermarks and metrics if files are configured
//!
//! A failed fetch makes the cycle empty. A failed publish drops that event.
//!
//! ## Communication
//!
//! - **Status Stream**: [`BridgeEvent`]s on a broadcast channel
//! - **Command Channel**: [`BridgeCommand`]s to poll now, change the
//!   interval or shut down
//!
//! # Example
//!
//! ```ignore
//! use jira_pubsub::bridge::BridgeBuilder;
//! use jira_pubsub::integrations::{JiraClient, LogSink};
//!
//! #[tokio::main]
//! async fn main() -> jira_pubsub::Result<()> {
//!     let source = JiraClient::new("https://jira.example.org/rest/api/2/search?jql=updated>-5m")?;
//!     let mut bridge = BridgeBuilder::new("https://jira.example.org/browse/")
//!         .poll_interval(std::time::Duration::from_secs(10))
//!         .source(source)
//!         .sink(LogSink)
//!         .build()?;
//!
//!     bridge.run().await
//! }
//! ```

mod daemon;
pub mod metrics;

pub use daemon::{
    Bridge, BridgeBuilder, BridgeCommand, BridgeConfig, BridgeEvent, BridgeStats, CycleReport,
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL,
};
