//! Logging configuration using tracing
//!
//! Structured logging to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "jira_pubsub=info";

/// Filter used when debug mode is on and `RUST_LOG` is unset
pub const DEBUG_FILTER: &str = "jira_pubsub=debug,jira_snapshot=debug";

/// Initialize the tracing subscriber
///
/// Sets up structured logging with:
/// - Filtering via RUST_LOG environment variable (defaults to `jira_pubsub=info`,
///   or debug level when `debug` is set)
/// - Formatted output to stderr with targets and line numbers
///
/// # Example RUST_LOG values
/// - `RUST_LOG=debug` - Everything at debug, dependencies included
/// - `RUST_LOG=jira_pubsub=trace` - Trace level for the bridge only
/// - `RUST_LOG=jira_pubsub=debug,reqwest=info` - Different levels per crate
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init(debug: bool) -> crate::Result<()> {
    let default = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| crate::BridgeError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init(true);
}
