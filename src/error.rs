//! Error types for jira-pubsub
//!
//! Defines a single error enum covering the failure modes of the bridge:
//! configuration, transport, routing and persistence. The change-detection
//! core itself never fails; malformed data is skipped, not raised.

use thiserror::Error;

/// Result type alias for jira-pubsub operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error type for jira-pubsub operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP errors
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing errors (search responses, replay files)
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Jira payload errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] jira_snapshot::Error),

    /// Integration errors (Jira, pubsub)
    #[error("Integration error: {0}")]
    Integration(String),

    /// An event could not be mapped to a publish target
    #[error("Routing error: {0}")]
    Routing(String),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Rate limited (with retry-after duration in seconds)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl BridgeError {
    /// Map a failed HTTP send. Connection failures and timeouts become
    /// `Network`; everything else stays an `Http` error.
    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            BridgeError::Network(err.to_string())
        } else {
            BridgeError::Http(err)
        }
    }
}

impl crate::integrations::retry::RetryableError for BridgeError {
    fn retry_decision(&self) -> crate::integrations::retry::RetryDecision {
        use crate::integrations::retry::RetryDecision;
        use std::time::Duration;

        match self {
            BridgeError::Network(_) => RetryDecision::Retry,
            BridgeError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
                        500..=599 => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else if e.is_decode() {
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::Retry
                }
            }
            BridgeError::RateLimited(secs) => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs))
            }
            BridgeError::Integration(msg) => {
                if msg.contains("HTTP 5") || msg.contains("timeout") {
                    RetryDecision::Retry
                } else {
                    RetryDecision::NoRetry
                }
            }
            BridgeError::Config(_)
            | BridgeError::Parse(_)
            | BridgeError::Io(_)
            | BridgeError::Json(_)
            | BridgeError::Yaml(_)
            | BridgeError::Snapshot(_)
            | BridgeError::Routing(_)
            | BridgeError::Other(_) => RetryDecision::NoRetry,
        }
    }
}
