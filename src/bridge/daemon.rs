//! Bridge daemon implementation
//!
//! Polls an issue source on a fixed interval, classifies new activity and
//! publishes the resulting events. Runs as a tokio event loop.

use super::metrics;
use crate::config::Settings;
use crate::event::Event;
use crate::integrations::{EventSink, IssueSource};
use crate::tracker::ChangeTracker;
use crate::watermark::WatermarkStore;
use crate::{BridgeError, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// Default poll interval (5 seconds)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Bridge daemon configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interval between polls
    pub poll_interval: Duration,

    /// Prefix for issue links
    pub link_base: String,

    /// Creation grace window
    pub grace_window: chrono::Duration,

    /// Watermark persistence file
    pub state_file: Option<PathBuf>,

    /// Prometheus textfile output
    pub metrics_file: Option<PathBuf>,

    /// Status broadcast channel capacity
    pub event_channel_capacity: usize,
}

impl BridgeConfig {
    /// Create a new config with the issue link base
    pub fn new(link_base: impl Into<String>) -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            link_base: link_base.into(),
            grace_window: chrono::Duration::seconds(crate::classify::DEFAULT_GRACE_WINDOW_SECS),
            state_file: None,
            metrics_file: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Daemon settings from a loaded configuration file
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::new(settings.jira_base.clone())
            .with_poll_interval(settings.poll_interval())
            .with_grace_window(settings.grace_window());
        config.state_file = settings.state_file.clone();
        config.metrics_file = settings.metrics_file.clone();
        config
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_grace_window(mut self, grace: chrono::Duration) -> Self {
        self.grace_window = grace;
        self
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn with_metrics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_file = Some(path.into());
        self
    }
}

/// Status events broadcast by the daemon
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Started,

    Stopped,

    PollStarted,

    /// Poll cycle completed
    PollCompleted(CycleReport),

    /// Fetch failed; the cycle was empty
    FetchFailed { message: String },

    /// One event could not be delivered and was dropped
    PublishFailed {
        key: String,
        action: &'static str,
        message: String,
    },
}

/// Commands that can be sent to the daemon
#[derive(Debug, Clone)]
pub enum BridgeCommand {
    /// Poll immediately
    PollNow,

    /// Stop the daemon
    Shutdown,

    /// Change the poll interval
    SetPollInterval(Duration),
}

/// Result of handling a command
enum CommandResult {
    Continue,
    Stop,
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Issues returned by the source
    pub issues: usize,
    /// Events classified
    pub events: usize,
    pub published: usize,
    /// Events dropped after a publish failure
    pub failed: usize,
    /// The fetch failed and nothing was processed
    pub fetch_failed: bool,
}

impl CycleReport {
    fn status(&self) -> &'static str {
        if self.fetch_failed {
            "fetch_failed"
        } else if self.failed > 0 {
            "partial"
        } else {
            "success"
        }
    }
}

/// Jira to pubsub bridge daemon
pub struct Bridge {
    config: BridgeConfig,
    tracker: ChangeTracker,
    store: WatermarkStore,
    source: Box<dyn IssueSource>,
    sink: Box<dyn EventSink>,
    event_tx: broadcast::Sender<BridgeEvent>,
    command_rx: Option<mpsc::Receiver<BridgeCommand>>,
    command_tx: mpsc::Sender<BridgeCommand>,
    running: bool,
    stats: BridgeStats,
}

impl Bridge {
    /// Create a bridge
    ///
    /// Watermarks are loaded from the state file when one is configured;
    /// otherwise tracking starts empty with the launch time set to now.
    pub fn new(
        config: BridgeConfig,
        source: Box<dyn IssueSource>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        let launch_time = Utc::now();
        let store = match config.state_file {
            Some(ref path) => WatermarkStore::load(path, launch_time)?,
            None => WatermarkStore::new(launch_time),
        };
        Ok(Self::with_store(config, source, sink, store))
    }

    /// Create a bridge around an existing watermark store
    pub fn with_store(
        config: BridgeConfig,
        source: Box<dyn IssueSource>,
        sink: Box<dyn EventSink>,
        store: WatermarkStore,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(10);
        let tracker = ChangeTracker::new(config.link_base.clone())
            .with_grace_window(config.grace_window);

        metrics::set_tracked_issues(store.len());

        Self {
            stats: BridgeStats {
                poll_interval: config.poll_interval,
                ..BridgeStats::default()
            },
            config,
            tracker,
            store,
            source,
            sink,
            event_tx,
            command_rx: Some(command_rx),
            command_tx,
            running: false,
        }
    }

    /// Get an event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    /// Get a command sender
    pub fn command_sender(&self) -> mpsc::Sender<BridgeCommand> {
        self.command_tx.clone()
    }

    fn send_event(&self, event: BridgeEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Status event sent but no receivers subscribed");
        }
    }

    /// Run the daemon event loop with graceful shutdown on SIGTERM/SIGINT
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| BridgeError::Config("Daemon already running".to_string()))?;
        let mut signals = ShutdownSignals::new()?;

        self.running = true;
        self.send_event(BridgeEvent::Started);
        tracing::info!(
            source = self.source.name(),
            sink = self.sink.name(),
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            tracked = self.store.len(),
            "Bridge daemon started"
        );

        let mut interval = new_interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.running {
                        self.poll_once().await;
                    }
                }
                Some(cmd) = command_rx.recv() => {
                    match self.handle_command(cmd, &mut interval).await {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
                name = signals.recv() => {
                    tracing::info!(signal = name, "Received signal, initiating graceful shutdown");
                    self.running = false;
                    break;
                }
            }
        }

        tracing::info!("Performing shutdown cleanup");
        self.cleanup();
        self.command_rx = Some(command_rx);
        self.send_event(BridgeEvent::Stopped);
        Ok(())
    }

    async fn handle_command(
        &mut self,
        cmd: BridgeCommand,
        interval: &mut tokio::time::Interval,
    ) -> CommandResult {
        match cmd {
            BridgeCommand::PollNow => {
                self.poll_once().await;
            }
            BridgeCommand::Shutdown => {
                tracing::info!("Received shutdown command");
                self.running = false;
                return CommandResult::Stop;
            }
            BridgeCommand::SetPollInterval(duration) => {
                if duration.is_zero() {
                    tracing::warn!("Ignoring zero poll interval");
                } else {
                    *interval = new_interval(duration);
                    self.config.poll_interval = duration;
                    self.stats.poll_interval = duration;
                    tracing::info!(poll_interval_secs = duration.as_secs_f64(), "Poll interval changed");
                }
            }
        }
        CommandResult::Continue
    }

    fn cleanup(&mut self) {
        self.persist_state();
        tracing::info!(
            tracked = self.store.len(),
            cycles = self.stats.cycles,
            published = self.stats.events_published,
            "Bridge daemon shutdown complete"
        );
    }

    /// Run a single poll cycle now
    pub async fn poll_once(&mut self) -> CycleReport {
        self.poll_at(Utc::now()).await
    }

    /// Run a single poll cycle, classifying against `now`
    pub async fn poll_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        self.send_event(BridgeEvent::PollStarted);
        let start = Instant::now();
        let mut report = CycleReport::default();

        match self.source.fetch().await {
            Ok(snapshots) => {
                report.issues = snapshots.len();
                let events = self.tracker.process_batch(&mut self.store, &snapshots, now);
                report.events = events.len();

                for event in &events {
                    metrics::record_event(event.kind());
                    if self.deliver(event).await {
                        report.published += 1;
                    } else {
                        report.failed += 1;
                    }
                }

                self.persist_state();
            }
            Err(e) => {
                tracing::warn!(source = self.source.name(), error = %e, "Fetch failed, skipping cycle");
                metrics::record_fetch_error(self.source.name());
                report.fetch_failed = true;
                self.send_event(BridgeEvent::FetchFailed {
                    message: e.to_string(),
                });
            }
        }

        metrics::set_tracked_issues(self.store.len());
        metrics::record_poll_cycle(report.status(), start.elapsed().as_secs_f64());
        self.write_metrics();
        self.stats.record(&report);

        tracing::debug!(
            issues = report.issues,
            events = report.events,
            published = report.published,
            failed = report.failed,
            "Poll cycle complete"
        );
        self.send_event(BridgeEvent::PollCompleted(report.clone()));
        report
    }

    /// Publish one event; failures are logged and the event dropped
    async fn deliver(&self, event: &Event) -> bool {
        match self.sink.publish(event).await {
            Ok(()) => {
                tracing::debug!(key = %event.key, action = event.kind(), "Event published");
                true
            }
            Err(e) => {
                tracing::warn!(
                    key = %event.key,
                    action = event.kind(),
                    sink = self.sink.name(),
                    error = %e,
                    "Publish failed, dropping event"
                );
                metrics::record_publish_failure(self.sink.name());
                self.send_event(BridgeEvent::PublishFailed {
                    key: event.key.clone(),
                    action: event.kind(),
                    message: e.to_string(),
                });
                false
            }
        }
    }

    fn persist_state(&self) {
        if let Some(ref path) = self.config.state_file {
            if let Err(e) = self.store.save(path) {
                tracing::error!(path = %path.display(), error = %e, "Failed to save watermarks");
            }
        }
    }

    fn write_metrics(&self) {
        if let Some(ref path) = self.config.metrics_file {
            if let Err(e) = metrics::write_textfile(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics file");
            }
        }
    }

    pub fn store(&self) -> &WatermarkStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            tracked_issues: self.store.len(),
            ..self.stats.clone()
        }
    }
}

fn new_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// SIGTERM/SIGINT on Unix, Ctrl-C elsewhere
struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm = signal(SignalKind::terminate()).map_err(|e| {
            BridgeError::Other(format!("Failed to set up SIGTERM handler: {}", e))
        })?;
        let sigint = signal(SignalKind::interrupt()).map_err(|e| {
            BridgeError::Other(format!("Failed to set up SIGINT handler: {}", e))
        })?;
        Ok(Self { sigterm, sigint })
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(_) => std::future::pending().await,
        }
    }
}

/// Bridge statistics
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Issues with a watermark
    pub tracked_issues: usize,

    /// Poll cycles run
    pub cycles: u64,

    pub fetch_failures: u64,

    pub events_published: u64,

    pub publish_failures: u64,

    /// Current poll interval
    pub poll_interval: Duration,
}

impl BridgeStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.fetch_failed {
            self.fetch_failures += 1;
        }
        self.events_published += report.published as u64;
        self.publish_failures += report.failed as u64;
    }
}

/// Builder for the bridge daemon
pub struct BridgeBuilder {
    config: BridgeConfig,
    source: Option<Box<dyn IssueSource>>,
    sink: Option<Box<dyn EventSink>>,
    store: Option<WatermarkStore>,
}

impl BridgeBuilder {
    /// Create a new builder
    pub fn new(link_base: impl Into<String>) -> Self {
        Self {
            config: BridgeConfig::new(link_base),
            source: None,
            sink: None,
            store: None,
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn grace_window(mut self, grace: chrono::Duration) -> Self {
        self.config.grace_window = grace;
        self
    }

    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file = Some(path.into());
        self
    }

    pub fn metrics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.metrics_file = Some(path.into());
        self
    }

    pub fn source(mut self, source: impl IssueSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Start from this store instead of loading or creating one
    pub fn store(mut self, store: WatermarkStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the bridge
    pub fn build(self) -> Result<Bridge> {
        let source = self
            .source
            .ok_or_else(|| BridgeError::Config("Bridge needs an issue source".to_string()))?;
        let sink = self
            .sink
            .ok_or_else(|| BridgeError::Config("Bridge needs an event sink".to_string()))?;

        match self.store {
            Some(store) => Ok(Bridge::with_store(self.config, source, sink, store)),
            None => Bridge::new(self.config, source, sink),
        }
    }
}
