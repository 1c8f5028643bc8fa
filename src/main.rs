//! jira-pubsub - Jira activity to pubsub event bridge
//!
//! Main entry point for the jira-pubsub CLI.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use jira_pubsub::bridge::{Bridge, BridgeConfig};
use jira_pubsub::config::{validate_settings_result, Settings};
use jira_pubsub::integrations::jira::decode_search_response;
use jira_pubsub::integrations::retry::RetryConfig;
use jira_pubsub::integrations::{
    EventSink, JiraClient, JiraCredentials, LogSink, PubSubPublisher,
};
use jira_pubsub::routing::RouteTemplate;
use jira_pubsub::{BridgeError, ChangeTracker};
use std::path::PathBuf;
use std::process;

/// Jira to pubsub bridge
#[derive(Parser, Debug)]
#[command(name = "jira-pubsub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ./jira-to-pubsub.yaml)
    #[arg(short, long, env = "JIRA_PUBSUB_CONFIG")]
    config: Option<PathBuf>,

    /// Log events instead of publishing them, with debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the polling daemon (default)
    Run {
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Load and validate the configuration
    Validate,

    /// Classify a saved Jira search response and print events as JSON lines
    Replay {
        /// File containing a search response body
        file: PathBuf,

        /// Report activity after this time (RFC 3339 or Jira format; default: everything)
        #[arg(long)]
        since: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let settings = Settings::load_or_default(cli.config.as_deref());
    let debug = cli.debug || settings.as_ref().map(|s| s.debug).unwrap_or(false);

    if let Err(e) = jira_pubsub::logging::init(debug) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli, settings) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli, settings: jira_pubsub::Result<Settings>) -> jira_pubsub::Result<()> {
    let settings = settings?;
    let debug = cli.debug || settings.debug;

    match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::Validate => {
            validate_settings_result(&settings)?;
            println!("Configuration OK");
            println!("  Jira:      {}", settings.jira_url);
            println!("  Links:     {}", settings.jira_base);
            println!("  Pubsub:    {}", settings.pubsub_url);
            println!("  Interval:  {}s", settings.poll_interval);
            if let Some(ref path) = settings.state_file {
                println!("  State:     {}", path.display());
            }
            Ok(())
        }
        Commands::Run { once } => {
            validate_settings_result(&settings)?;
            let mut bridge = build_bridge(&settings, debug)?;
            let runtime = tokio::runtime::Runtime::new()?;

            runtime.block_on(async {
                if once {
                    let report = bridge.poll_once().await;
                    tracing::info!(
                        issues = report.issues,
                        events = report.events,
                        published = report.published,
                        failed = report.failed,
                        "Single poll cycle complete"
                    );
                    if report.fetch_failed {
                        return Err(BridgeError::Integration(
                            "Fetching issues from Jira failed".to_string(),
                        ));
                    }
                    Ok(())
                } else {
                    bridge.run().await
                }
            })
        }
        Commands::Replay { file, since } => {
            let since = match since {
                Some(raw) => jira_snapshot::parse_timestamp(&raw)?,
                None => DateTime::<Utc>::UNIX_EPOCH,
            };

            let content = std::fs::read_to_string(&file)?;
            let snapshots = decode_search_response(serde_json::from_str(&content)?)?;
            let tracker = ChangeTracker::new(settings.jira_base.clone())
                .with_grace_window(settings.grace_window());

            for event in tracker.replay(&snapshots, since, Utc::now()) {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}

fn build_bridge(settings: &Settings, debug: bool) -> jira_pubsub::Result<Bridge> {
    let source = JiraClient::new(settings.jira_url.clone())?
        .with_credentials(JiraCredentials {
            user: settings.jira_user.clone(),
            password: settings.password()?,
        })
        .with_timeout(settings.fetch_timeout())
        .with_retry(RetryConfig::for_fetch(settings.fetch_retries));

    tracing::info!(
        url = source.search_url(),
        authenticated = source.is_authenticated(),
        retries = settings.fetch_retries,
        "Jira source configured"
    );

    let sink: Box<dyn EventSink> = if debug {
        tracing::info!("Debug mode: events are logged, not published");
        Box::new(LogSink)
    } else {
        let route = RouteTemplate::parse(&settings.pubsub_url)?;
        Box::new(PubSubPublisher::new(route)?.with_timeout(settings.publish_timeout()))
    };

    Bridge::new(BridgeConfig::from_settings(settings), Box::new(source), sink)
}
