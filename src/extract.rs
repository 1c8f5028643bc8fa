//! Candidate extraction
//!
//! Walks the three activity lists of an issue snapshot (changelog histories,
//! comments, worklogs) and keeps the entries whose effective time is strictly
//! newer than the issue's watermark. Entries without a usable creation time
//! cannot be placed on the timeline and are dropped.

use crate::event::Actor;
use chrono::{DateTime, Utc};
use jira_snapshot::{HistoryItem, IssueSnapshot, Timestamped};
use serde_json::Value;
use tracing::trace;

/// Kind-specific part of a candidate, borrowed from the snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandidateKind<'a> {
    /// A changelog entry and the fields it touched
    History { items: &'a [HistoryItem] },
    Comment { body: &'a Value },
    Worklog { comment: &'a Value, time_spent: u64 },
}

/// A sub-record newer than the watermark, not yet classified
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub created: DateTime<Utc>,
    /// Update time if present, else creation time
    pub effective: DateTime<Utc>,
    pub actor: Actor,
    pub kind: CandidateKind<'a>,
}

impl Candidate<'_> {
    /// True when the record was modified after it was created
    pub fn is_edit(&self) -> bool {
        self.effective != self.created
    }
}

/// Actor of a record: its author, else its creator, else unknown
pub fn resolve_actor<R: Timestamped + ?Sized>(record: &R) -> Actor {
    record
        .author()
        .or_else(|| record.creator())
        .map(Actor::from_user)
        .unwrap_or_else(Actor::unknown)
}

/// Apply the qualification rule to one record. Returns the creation and
/// effective times when the record is newer than `watermark`.
fn qualify<R: Timestamped>(
    record: &R,
    watermark: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let created = match record.created_at() {
        Ok(t) => t,
        Err(e) => {
            trace!(error = %e, "Skipping record without usable creation time");
            return None;
        }
    };
    let effective = record.updated_at().unwrap_or(created);
    (effective > watermark).then_some((created, effective))
}

/// All candidates of `snapshot` newer than `watermark`, in source order:
/// histories, then comments, then worklogs.
pub fn extract_candidates(snapshot: &IssueSnapshot, watermark: DateTime<Utc>) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::new();

    for history in snapshot.histories() {
        if let Some((created, effective)) = qualify(history, watermark) {
            candidates.push(Candidate {
                created,
                effective,
                actor: resolve_actor(history),
                kind: CandidateKind::History {
                    items: &history.items,
                },
            });
        }
    }

    for comment in snapshot.comments() {
        if let Some((created, effective)) = qualify(comment, watermark) {
            candidates.push(Candidate {
                created,
                effective,
                actor: resolve_actor(comment),
                kind: CandidateKind::Comment {
                    body: &comment.body,
                },
            });
        }
    }

    for worklog in snapshot.worklogs() {
        if let Some((created, effective)) = qualify(worklog, watermark) {
            candidates.push(Candidate {
                created,
                effective,
                actor: resolve_actor(worklog),
                kind: CandidateKind::Worklog {
                    comment: &worklog.comment,
                    time_spent: worklog.time_spent_seconds,
                },
            });
        }
    }

    trace!(
        key = %snapshot.key,
        watermark = %watermark,
        candidates = candidates.len(),
        "Extracted candidates"
    );

    candidates
}
