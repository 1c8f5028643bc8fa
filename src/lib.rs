//! jira-pubsub - Jira activity to pubsub event bridge
//!
//! Polls a Jira search for recently updated issues, works out which changes
//! have not been reported yet, classifies them into typed events (create,
//! close, status, assign, comment, ...) and publishes each event as JSON to a
//! pubsub endpoint.
//!
//! # Architecture
//!
//! - **watermark**: Per-issue "already reported up to" times
//! - **extract**: Activity newer than the watermark, as candidates
//! - **classify**: Candidates to events, plus new-issue detection
//! - **advance**: Watermark advancement after classification
//! - **tracker**: The per-issue pipeline over a batch
//! - **event**: Event model and wire shape
//! - **routing**: Validated publish target templates
//! - **integrations**: Jira source, pubsub and log sinks, retries
//! - **bridge**: Polling daemon and metrics
//! - **config**: YAML settings and validation
//!
//! The Jira payload model lives in the `jira-snapshot` crate.

// Change detection core
pub mod advance;
pub mod classify;
pub mod event;
pub mod extract;
pub mod tracker;
pub mod watermark;

// Delivery and runtime
pub mod bridge;
pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod routing;

// Re-exports
pub use error::{BridgeError, Result};
pub use event::{Action, Event};
pub use tracker::ChangeTracker;
pub use watermark::{WatermarkState, WatermarkStore};
