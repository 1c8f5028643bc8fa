//! Jira Integration Adapter
//!
//! Fetches recently updated issues, with their changelog, comments and
//! worklogs, from the Jira REST search endpoint.

use super::retry::{with_retry, RetryConfig};
use super::IssueSource;
use crate::{BridgeError, Result};
use async_trait::async_trait;
use jira_snapshot::{IssueSnapshot, SearchPage};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-request timeout for the search call
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Basic-auth credentials for Jira
#[derive(Clone)]
pub struct JiraCredentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for JiraCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Jira search client
///
/// `search_url` is the full search request, JQL included, e.g.
/// `https://jira.example.org/rest/api/2/search?jql=updated>-5m&expand=changelog&fields=*all`.
pub struct JiraClient {
    client: Client,
    search_url: String,
    credentials: Option<JiraCredentials>,
    timeout: Duration,
    retry: RetryConfig,
}

impl JiraClient {
    /// Create a new Jira client
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(search_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jira-pubsub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            search_url: search_url.into(),
            credentials: None,
            timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_credentials(mut self, credentials: JiraCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// One search request, without retries
    async fn search_once(&self) -> Result<Vec<IssueSnapshot>> {
        debug!(url = %self.search_url, "Searching Jira");

        let mut request = self.client.get(&self.search_url);
        if let Some(ref creds) = self.credentials {
            request = request.basic_auth(&creds.user, Some(&creds.password));
        }

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(BridgeError::transport)?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response.json().await?;
                decode_search_response(body)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BridgeError::Integration(
                "Jira authentication failed".to_string(),
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                Err(BridgeError::RateLimited(retry_after))
            }
            status => {
                let error_body = response.text().await.unwrap_or_default();
                Err(BridgeError::Integration(format!(
                    "Jira search failed: HTTP {}: {}",
                    status, error_body
                )))
            }
        }
    }
}

/// Decode a search response body
///
/// The body must be a JSON object. Issues that fail to decode are skipped
/// with a warning rather than failing the whole page.
pub fn decode_search_response(body: Value) -> Result<Vec<IssueSnapshot>> {
    if !body.is_object() {
        return Err(BridgeError::Parse(
            "Jira search did not return a JSON object".to_string(),
        ));
    }

    let page: SearchPage = serde_json::from_value(body)?;
    let total = page.total;
    let (issues, failures) = page.decode();

    for (index, error) in &failures {
        warn!(index, error = %error, "Skipping malformed issue in Jira response");
    }

    info!(
        total = ?total,
        returned = issues.len(),
        skipped = failures.len(),
        "Jira search complete"
    );

    Ok(issues)
}

#[async_trait]
impl IssueSource for JiraClient {
    async fn fetch(&self) -> Result<Vec<IssueSnapshot>> {
        with_retry(&self.retry, "jira_search", || self.search_once()).await
    }

    fn name(&self) -> &str {
        "jira"
    }
}
