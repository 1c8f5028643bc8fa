//! Configuration system
//!
//! Loads `jira-to-pubsub.yaml` with support for:
//! - Jira search URL, credentials (inline or from the environment) and link base
//! - A pubsub route template
//! - Poll interval, grace window, timeouts and retries
//! - Optional watermark and metrics files

mod settings;
pub mod validation;

pub use settings::{Settings, DEFAULT_CONFIG_FILE};
pub use validation::{validate_settings, validate_settings_result, ValidationError};
