//! Prometheus metrics for the bridge daemon
//!
//! Registered in the default registry. When a metrics file is configured the
//! text exposition is written there after every cycle, for node_exporter's
//! textfile collector.

use crate::{BridgeError, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::io::Write;
use std::path::Path;

lazy_static! {
    /// Counter: poll cycles by outcome
    pub static ref POLL_CYCLES: CounterVec = register_counter_vec!(
        "jira_pubsub_poll_cycles_total",
        "Total poll cycles by status",
        &["status"]
    )
    .expect("Failed to create poll_cycles metric");

    /// Histogram: poll cycle duration (seconds)
    pub static ref CYCLE_DURATION: Histogram = register_histogram!(
        "jira_pubsub_cycle_duration_seconds",
        "Duration of poll cycles, fetch and publish included",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0]
    )
    .expect("Failed to create cycle_duration metric");

    /// Counter: events emitted by action
    pub static ref EVENTS_EMITTED: CounterVec = register_counter_vec!(
        "jira_pubsub_events_total",
        "Classified events by action",
        &["action"]
    )
    .expect("Failed to create events metric");

    /// Counter: failed publishes by sink
    pub static ref PUBLISH_FAILURES: CounterVec = register_counter_vec!(
        "jira_pubsub_publish_failures_total",
        "Events dropped because publishing failed",
        &["sink"]
    )
    .expect("Failed to create publish_failures metric");

    /// Counter: failed fetches by source
    pub static ref FETCH_ERRORS: CounterVec = register_counter_vec!(
        "jira_pubsub_fetch_errors_total",
        "Failed issue fetches",
        &["source"]
    )
    .expect("Failed to create fetch_errors metric");

    /// Gauge: issues with a watermark
    pub static ref TRACKED_ISSUES: Gauge = register_gauge!(
        "jira_pubsub_tracked_issues",
        "Number of issues with a watermark"
    )
    .expect("Failed to create tracked_issues metric");
}

/// Record a poll cycle completion
pub fn record_poll_cycle(status: &str, duration_secs: f64) {
    POLL_CYCLES.with_label_values(&[status]).inc();
    CYCLE_DURATION.observe(duration_secs);
}

pub fn record_event(action: &str) {
    EVENTS_EMITTED.with_label_values(&[action]).inc();
}

pub fn record_publish_failure(sink: &str) {
    PUBLISH_FAILURES.with_label_values(&[sink]).inc();
}

pub fn record_fetch_error(source: &str) {
    FETCH_ERRORS.with_label_values(&[source]).inc();
}

pub fn set_tracked_issues(count: usize) {
    TRACKED_ISSUES.set(count as f64);
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| BridgeError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| BridgeError::Other(format!("Metrics are not UTF-8: {}", e)))
}

/// Write the text exposition to `path`, replacing it atomically
pub fn write_textfile(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let text = encode_metrics()?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.persist(path).map_err(|e| BridgeError::Io(e.error))?;
    Ok(())
}
