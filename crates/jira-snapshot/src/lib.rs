//! Jira issue snapshot model for Rust
//!
//! A serde model of the issue payload returned by Jira's search endpoint when
//! called with `expand=changelog`, covering the parts needed to detect
//! change activity: the changelog histories, comments and worklog entries.
//!
//! # Example
//!
//! ```
//! use jira_snapshot::{IssueSnapshot, Timestamped};
//!
//! let json = r#"{
//!     "key": "PROJ-1",
//!     "fields": {
//!         "summary": "Crash on start",
//!         "created": "2024-03-01T10:00:00.000+0000",
//!         "comment": { "comments": [
//!             { "body": "confirmed", "created": "2024-03-01T10:05:00.000+0000" }
//!         ] }
//!     }
//! }"#;
//!
//! let issue: IssueSnapshot = serde_json::from_str(json)?;
//! assert_eq!(issue.project(), "PROJ");
//! assert_eq!(issue.comments().len(), 1);
//! assert!(issue.comments()[0].created_at().is_ok());
//! # Ok::<(), jira_snapshot::Error>(())
//! ```

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Timestamp layout used by the Jira REST API, e.g. `2024-03-01T10:15:30.000+0000`
pub const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Errors that can occur when reading Jira payloads
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing timestamp field: {0}")]
    MissingTimestamp(&'static str),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Parse a Jira timestamp into UTC
///
/// Accepts the native Jira layout (`+0000` offsets, optional fraction) and
/// falls back to RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::<FixedOffset>::parse_from_str(raw, JIRA_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp(raw.to_string()))
}

/// A Jira user reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    /// Username on Jira Server / Data Center
    #[serde(default)]
    pub name: Option<String>,
    /// Account id on Jira Cloud
    #[serde(rename = "accountId", default)]
    pub account_id: Option<String>,
}

impl User {
    /// Best available stable identifier (username, then account id)
    pub fn uid(&self) -> Option<&str> {
        self.name.as_deref().or(self.account_id.as_deref())
    }
}

/// Common timing and authorship accessors for timestamped Jira records
pub trait Timestamped {
    /// Raw creation timestamp, if present
    fn created_raw(&self) -> Option<&str>;

    /// Raw last-update timestamp, if present
    fn updated_raw(&self) -> Option<&str>;

    /// The user who performed the action
    fn author(&self) -> Option<&User>;

    /// The user who created the record, used when no author is present
    fn creator(&self) -> Option<&User> {
        None
    }

    /// Parsed creation time
    fn created_at(&self) -> Result<DateTime<Utc>> {
        self.created_raw()
            .ok_or(Error::MissingTimestamp("created"))
            .and_then(parse_timestamp)
    }

    /// Parsed update time, if present and valid
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_raw().and_then(|raw| parse_timestamp(raw).ok())
    }
}

/// One changed field inside a changelog history entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(rename = "fromString", default)]
    pub from_value: Option<String>,
    #[serde(rename = "toString", default)]
    pub to_value: Option<String>,
}

/// A changelog history entry: one edit session touching one or more fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub items: Vec<HistoryItem>,
}

impl Timestamped for History {
    fn created_raw(&self) -> Option<&str> {
        self.created.as_deref()
    }

    fn updated_raw(&self) -> Option<&str> {
        None
    }

    fn author(&self) -> Option<&User> {
        self.author.as_ref()
    }
}

/// Issue changelog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub histories: Vec<History>,
}

/// A comment on an issue
///
/// `body` is a plain string on API v2 and an Atlassian Document on API v3; it
/// is kept as raw JSON and forwarded untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

impl Timestamped for Comment {
    fn created_raw(&self) -> Option<&str> {
        self.created.as_deref()
    }

    fn updated_raw(&self) -> Option<&str> {
        self.updated.as_deref()
    }

    fn author(&self) -> Option<&User> {
        self.author.as_ref()
    }
}

/// A worklog entry on an issue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Worklog {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub comment: Value,
    #[serde(rename = "timeSpentSeconds", default)]
    pub time_spent_seconds: u64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

impl Timestamped for Worklog {
    fn created_raw(&self) -> Option<&str> {
        self.created.as_deref()
    }

    fn updated_raw(&self) -> Option<&str> {
        self.updated.as_deref()
    }

    fn author(&self) -> Option<&User> {
        self.author.as_ref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorklogPage {
    #[serde(default)]
    pub worklogs: Vec<Worklog>,
}

/// Issue fields relevant to change tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub creator: Option<User>,
    #[serde(default)]
    pub reporter: Option<User>,
    #[serde(default)]
    pub comment: Option<CommentPage>,
    #[serde(default)]
    pub worklog: Option<WorklogPage>,
}

impl Timestamped for IssueFields {
    fn created_raw(&self) -> Option<&str> {
        self.created.as_deref()
    }

    fn updated_raw(&self) -> Option<&str> {
        self.updated.as_deref()
    }

    /// Issues have no acting author of their own
    fn author(&self) -> Option<&User> {
        None
    }

    fn creator(&self) -> Option<&User> {
        self.creator.as_ref().or(self.reporter.as_ref())
    }
}

/// A single issue as returned by a search with `expand=changelog`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub key: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: IssueFields,
    #[serde(default)]
    pub changelog: Option<Changelog>,
}

impl IssueSnapshot {
    /// Decode one issue from raw JSON
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Project key: everything before the first `-` of the issue key
    pub fn project(&self) -> &str {
        self.key.split('-').next().unwrap_or(&self.key)
    }

    pub fn histories(&self) -> &[History] {
        self.changelog
            .as_ref()
            .map(|c| c.histories.as_slice())
            .unwrap_or_default()
    }

    pub fn comments(&self) -> &[Comment] {
        self.fields
            .comment
            .as_ref()
            .map(|c| c.comments.as_slice())
            .unwrap_or_default()
    }

    pub fn worklogs(&self) -> &[Worklog] {
        self.fields
            .worklog
            .as_ref()
            .map(|w| w.worklogs.as_slice())
            .unwrap_or_default()
    }
}

/// Search response envelope
///
/// Issues are kept as raw JSON so that one malformed issue can be skipped
/// without discarding the whole page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(rename = "startAt", default)]
    pub start_at: Option<u64>,
    #[serde(rename = "maxResults", default)]
    pub max_results: Option<u64>,
    #[serde(default)]
    pub issues: Vec<Value>,
}

impl SearchPage {
    /// Decode every issue on the page, pairing failures with their position
    pub fn decode(self) -> (Vec<IssueSnapshot>, Vec<(usize, Error)>) {
        let mut issues = Vec::with_capacity(self.issues.len());
        let mut failures = Vec::new();

        for (index, raw) in self.issues.into_iter().enumerate() {
            match IssueSnapshot::from_value(raw) {
                Ok(issue) => issues.push(issue),
                Err(e) => failures.push((index, e)),
            }
        }

        (issues, failures)
    }
}
