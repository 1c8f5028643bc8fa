//! Configuration validation
//!
//! Checks bridge settings before the daemon starts:
//! - Jira search and link URLs are absolute http(s) URLs
//! - Credentials are present
//! - The pubsub route template parses
//! - Intervals and timeouts are non-zero

use super::settings::Settings;
use crate::routing::RouteTemplate;
use crate::BridgeError;
use reqwest::Url;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate bridge settings, collecting every problem
pub fn validate_settings(settings: &Settings) -> ValidationResult {
    let mut errors = Vec::new();

    if let Err(e) = check_http_url("jira_url", &settings.jira_url) {
        errors.push(e);
    }

    if let Err(e) = check_http_url("jira_base", &settings.jira_base) {
        errors.push(e);
    }

    if settings.jira_user.trim().is_empty() {
        errors.push(ValidationError::new("jira_user", "Jira user cannot be empty"));
    }

    match (&settings.jira_pass, &settings.jira_pass_env) {
        (Some(_), _) => {}
        (None, Some(var)) => {
            if std::env::var(var).is_err() {
                errors.push(ValidationError::new(
                    "jira_pass_env",
                    format!("Environment variable {} is not set", var),
                ));
            }
        }
        (None, None) => errors.push(ValidationError::new(
            "jira_pass",
            "Either jira_pass or jira_pass_env must be set",
        )),
    }

    if settings.pubsub_url.trim().is_empty() {
        errors.push(ValidationError::new("pubsub_url", "Pubsub URL cannot be empty"));
    } else if let Err(e) = RouteTemplate::parse(&settings.pubsub_url) {
        errors.push(ValidationError::new("pubsub_url", route_message(e)));
    }

    for (field, value) in [
        ("poll_interval", settings.poll_interval),
        ("fetch_timeout", settings.fetch_timeout),
        ("publish_timeout", settings.publish_timeout),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "Must be greater than 0"));
        }
    }

    if settings.fetch_timeout > settings.poll_interval.saturating_mul(10) {
        tracing::warn!(
            fetch_timeout = settings.fetch_timeout,
            poll_interval = settings.poll_interval,
            "Fetch timeout is much longer than the poll interval"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "URL cannot be empty"));
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ValidationError::new(
            field,
            format!("Unsupported URL scheme '{}': {}", url.scheme(), value),
        )),
        Err(e) => Err(ValidationError::new(
            field,
            format!("Invalid URL {}: {}", value, e),
        )),
    }
}

fn route_message(err: BridgeError) -> String {
    match err {
        BridgeError::Config(msg) => msg,
        other => other.to_string(),
    }
}

/// Validate settings and return a Result
pub fn validate_settings_result(settings: &Settings) -> crate::Result<()> {
    validate_settings(settings).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        BridgeError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
