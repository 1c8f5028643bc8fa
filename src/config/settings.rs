//! Bridge configuration file handling
//!
//! Loads `jira-to-pubsub.yaml`. Every key except the connection settings has a
//! default, so a minimal file only names Jira, credentials and the pubsub
//! target.

use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "jira-to-pubsub.yaml";

/// Bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Jira search URL, JQL included
    pub jira_url: String,

    pub jira_user: String,

    /// Jira password or API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_pass: Option<String>,

    /// Environment variable to read the password from when `jira_pass` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_pass_env: Option<String>,

    /// Prefix for issue links; the issue key is appended
    pub jira_base: String,

    /// Route template for publish targets
    pub pubsub_url: String,

    /// Log events instead of publishing them
    #[serde(default)]
    pub debug: bool,

    /// Seconds between polls
    #[serde(default = "default_poll_interval", alias = "polling_internal")]
    pub poll_interval: u64,

    /// Seconds around "now" in which a first-seen issue counts as new
    #[serde(default = "default_grace_window")]
    pub grace_window: u64,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,

    #[serde(default = "default_publish_timeout")]
    pub publish_timeout: u64,

    /// Retries for transient search failures within one cycle
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Where to persist watermarks between runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Where to write Prometheus text metrics after each cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<PathBuf>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_grace_window() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_publish_timeout() -> u64 {
    5
}

fn default_fetch_retries() -> u32 {
    2
}

impl Settings {
    /// Settings with the given connection values and defaults elsewhere
    pub fn new(
        jira_url: impl Into<String>,
        jira_user: impl Into<String>,
        jira_base: impl Into<String>,
        pubsub_url: impl Into<String>,
    ) -> Self {
        Self {
            jira_url: jira_url.into(),
            jira_user: jira_user.into(),
            jira_pass: None,
            jira_pass_env: None,
            jira_base: jira_base.into(),
            pubsub_url: pubsub_url.into(),
            debug: false,
            poll_interval: default_poll_interval(),
            grace_window: default_grace_window(),
            fetch_timeout: default_fetch_timeout(),
            publish_timeout: default_publish_timeout(),
            fetch_retries: default_fetch_retries(),
            state_file: None,
            metrics_file: None,
        }
    }

    /// Load from the given path, or from the default location
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(Self::default_path()),
        }
    }

    /// Load settings from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading bridge configuration");

        let content = fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            jira_url = %settings.jira_url,
            poll_interval = settings.poll_interval,
            debug = settings.debug,
            "Configuration loaded successfully"
        );

        Ok(settings)
    }

    /// Save settings to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// `jira-to-pubsub.yaml` in the working directory if present, else
    /// `~/.config/jira-pubsub/config.yaml`
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return local;
        }

        match dirs::home_dir() {
            Some(mut path) => {
                path.push(".config");
                path.push("jira-pubsub");
                path.push("config.yaml");
                if path.exists() {
                    path
                } else {
                    local
                }
            }
            None => local,
        }
    }

    /// Resolve the Jira password from `jira_pass` or `jira_pass_env`
    pub fn password(&self) -> Result<String> {
        if let Some(ref pass) = self.jira_pass {
            return Ok(pass.clone());
        }

        match self.jira_pass_env {
            Some(ref var) => std::env::var(var).map_err(|_| {
                BridgeError::Config(format!("Environment variable {} is not set", var))
            }),
            None => Err(BridgeError::Config(
                "Either jira_pass or jira_pass_env must be set".to_string(),
            )),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn grace_window(&self) -> chrono::Duration {
        let secs = i64::try_from(self.grace_window).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(i64::MAX / 1_000))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout)
    }
}
