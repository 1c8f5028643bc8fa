//! Event classification
//!
//! Turns candidates into events. History entries are dispatched per changed
//! field; comments and worklogs become `comment` or `comment_edit` depending
//! on whether they were modified after creation.
//!
//! Nothing is classified for an issue that has never been observed: the first
//! sighting of an issue only establishes its watermark, so that its full
//! back-history is not replayed. The one exception is a freshly created issue,
//! which gets a synthetic `create` event (see [`detect_creation`]).

use crate::event::{Action, Event, IssueRef};
use crate::extract::{resolve_actor, Candidate, CandidateKind};
use crate::watermark::WatermarkState;
use chrono::{DateTime, Duration, Utc};
use jira_snapshot::{HistoryItem, IssueSnapshot, Timestamped};
use serde_json::Value;
use tracing::{debug, trace};

/// Default window, in seconds, around "now" inside which a first-seen issue
/// counts as new
pub const DEFAULT_GRACE_WINDOW_SECS: i64 = 30;

const UNRESOLVED: &str = "Unresolved";

/// Map one changed field to an action. Fields not tracked yield `None`.
pub fn classify_item(item: &HistoryItem) -> Option<Action> {
    let from = || item.from_value.clone().unwrap_or_default();
    let to = || item.to_value.clone().unwrap_or_default();

    match item.field.as_deref()? {
        "resolution" => {
            let resolution = item
                .to_value
                .clone()
                .unwrap_or_else(|| UNRESOLVED.to_string());
            match item.from_value.as_deref() {
                None | Some("") => Some(Action::Close { resolution }),
                Some(previous) => Some(Action::Resolution {
                    from: previous.to_string(),
                    to: resolution,
                }),
            }
        }
        "status" => Some(Action::Status {
            from: from(),
            to: to(),
        }),
        "summary" => Some(Action::Summary {
            from: from(),
            to: to(),
        }),
        "description" => Some(Action::Description {
            from: from(),
            to: to(),
        }),
        "assignee" => Some(Action::Assign {
            from: from(),
            to: to(),
        }),
        other => {
            trace!(field = other, "Ignoring untracked field change");
            None
        }
    }
}

/// Classify one candidate into its events
///
/// History entries yield one event per tracked item; comments and worklogs
/// yield exactly one. `observed` is false for issues never seen before, in
/// which case nothing is emitted.
pub fn classify_candidate(issue: &IssueRef, candidate: &Candidate<'_>, observed: bool) -> Vec<Event> {
    if !observed {
        return Vec::new();
    }

    let event = |action| Event::new(issue, &candidate.actor, candidate.effective, action);

    match candidate.kind {
        CandidateKind::History { items } => items
            .iter()
            .filter_map(classify_item)
            .map(event)
            .collect(),
        CandidateKind::Comment { body } => vec![event(note_action(candidate, body, None))],
        CandidateKind::Worklog {
            comment,
            time_spent,
        } => vec![event(note_action(candidate, comment, Some(time_spent)))],
    }
}

fn note_action(candidate: &Candidate<'_>, body: &Value, time_spent: Option<u64>) -> Action {
    let body = body.clone();
    if candidate.is_edit() {
        Action::CommentEdit { body, time_spent }
    } else {
        Action::Comment { body, time_spent }
    }
}

/// Synthesize a `create` event for an issue seen for the first time shortly
/// after it was created
///
/// Returns `None` when the issue was already observed, has no usable creation
/// time, or was created more than `grace` away from `now`.
pub fn detect_creation(
    snapshot: &IssueSnapshot,
    issue: &IssueRef,
    state: WatermarkState,
    now: DateTime<Utc>,
    grace: Duration,
) -> Option<Event> {
    if state.is_seen() {
        return None;
    }

    let created = snapshot.fields.created_at().ok()?;
    let age = now.signed_duration_since(created);
    if age > grace || age < -grace {
        trace!(key = %issue.key, age_secs = age.num_seconds(), "Pre-existing issue, no create event");
        return None;
    }

    debug!(key = %issue.key, created = %created, "New issue detected");

    let description = snapshot
        .fields
        .description
        .clone()
        .filter(|d| !d.is_null())
        .unwrap_or_else(|| Value::String("(No description available)".to_string()));

    Some(Event::new(
        issue,
        &resolve_actor(&snapshot.fields),
        created,
        Action::Create { description },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Actor;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn grace() -> Duration {
        Duration::seconds(DEFAULT_GRACE_WINDOW_SECS)
    }

    fn issue() -> IssueRef {
        IssueRef {
            key: "PROJ-3".to_string(),
            link: "https://jira/browse/PROJ-3".to_string(),
            summary: "Flaky test".to_string(),
            project: "PROJ".to_string(),
        }
    }

    fn item(field: &str, from: Option<&str>, to: Option<&str>) -> HistoryItem {
        HistoryItem {
            field: Some(field.to_string()),
            from_value: from.map(str::to_string),
            to_value: to.map(str::to_string),
        }
    }

    fn history(items: &[HistoryItem], when: i64) -> Candidate<'_> {
        Candidate {
            created: at(when),
            effective: at(when),
            actor: Actor::new("Alice", "alice"),
            kind: CandidateKind::History { items },
        }
    }

    #[test]
    fn test_resolution_from_empty_closes() {
        let items = [item("resolution", None, Some("Fixed"))];
        let events = classify_candidate(&issue(), &history(&items, 10), true);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].action,
            Action::Close {
                resolution: "Fixed".to_string()
            }
        );
        assert_eq!(events[0].timestamp, at(10));
    }

    #[test]
    fn test_resolution_empty_string_counts_as_unresolved() {
        let action = classify_item(&item("resolution", Some(""), None)).unwrap();
        assert_eq!(
            action,
            Action::Close {
                resolution: "Unresolved".to_string()
            }
        );
    }

    #[test]
    fn test_resolution_change() {
        let items = [item("resolution", Some("Fixed"), Some("Duplicate"))];
        let events = classify_candidate(&issue(), &history(&items, 10), true);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].action,
            Action::Resolution {
                from: "Fixed".to_string(),
                to: "Duplicate".to_string()
            }
        );
    }

    #[test]
    fn test_unassign() {
        let items = [item("assignee", Some("alice"), Some(""))];
        let events = classify_candidate(&issue(), &history(&items, 10), true);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "assign");
        assert!(events[0].action_human_text.contains("unassigned *alice*"));
    }

    #[test]
    fn test_one_event_per_tracked_item() {
        let items = [
            item("status", Some("Open"), Some("Resolved")),
            item("resolution", None, Some("Fixed")),
            item("Fix Version", None, Some("2.0")),
            item("summary", Some("Flaky"), Some("Flaky test")),
            item("description", Some("a"), Some("b")),
        ];
        let events = classify_candidate(&issue(), &history(&items, 10), true);

        let kinds: Vec<_> = events.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["status", "close", "summary", "description"]);
        assert!(events.iter().all(|e| e.author_uid == "alice"));
    }

    #[test]
    fn test_item_without_field_is_ignored() {
        assert_eq!(classify_item(&HistoryItem::default()), None);
    }

    #[test]
    fn test_unobserved_issue_emits_nothing() {
        let items = [item("status", Some("Open"), Some("Closed"))];
        assert!(classify_candidate(&issue(), &history(&items, 10), false).is_empty());
    }

    #[test]
    fn test_comment_created_vs_edited() {
        let body = json!("looks good");
        let created = Candidate {
            created: at(10),
            effective: at(10),
            actor: Actor::new("Bob", "bob"),
            kind: CandidateKind::Comment { body: &body },
        };
        let edited = Candidate {
            effective: at(40),
            ..created.clone()
        };

        let first = classify_candidate(&issue(), &created, true);
        let second = classify_candidate(&issue(), &edited, true);

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind(), "comment");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind(), "comment_edit");
        assert_eq!(second[0].key, first[0].key);
        assert_eq!(
            second[0].action,
            Action::CommentEdit {
                body: json!("looks good"),
                time_spent: None
            }
        );
        assert_eq!(second[0].timestamp, at(40));
    }

    #[test]
    fn test_worklog_carries_duration() {
        let comment = json!("investigation");
        let candidate = Candidate {
            created: at(10),
            effective: at(10),
            actor: Actor::unknown(),
            kind: CandidateKind::Worklog {
                comment: &comment,
                time_spent: 1800,
            },
        };
        let events = classify_candidate(&issue(), &candidate, true);
        assert_eq!(
            events[0].action,
            Action::Comment {
                body: json!("investigation"),
                time_spent: Some(1800)
            }
        );
        assert_eq!(events[0].author, "??");
    }

    fn fresh_issue(created: i64) -> IssueSnapshot {
        let created = at(created)
            .format(jira_snapshot::JIRA_TIMESTAMP_FORMAT)
            .to_string();
        serde_json::from_value(json!({
            "key": "PROJ-3",
            "fields": {
                "summary": "Flaky test",
                "created": created,
                "creator": { "displayName": "Erin", "name": "erin" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_creation_inside_grace_window() {
        let snapshot = fresh_issue(1_000);
        let event = detect_creation(
            &snapshot,
            &issue(),
            WatermarkState::Unseen,
            at(1_020),
            grace(),
        )
        .unwrap();

        assert_eq!(event.kind(), "create");
        assert_eq!(event.timestamp, at(1_000));
        assert_eq!(event.author, "Erin");
        assert_eq!(
            event.action,
            Action::Create {
                description: json!("(No description available)")
            }
        );
        assert_eq!(event.action_human_text, "created PROJ-3: Flaky test");
    }

    #[test]
    fn test_no_creation_outside_grace_window() {
        let snapshot = fresh_issue(1_000);
        for now in [1_031, 5_000, 900] {
            assert!(detect_creation(
                &snapshot,
                &issue(),
                WatermarkState::Unseen,
                at(now),
                grace()
            )
            .is_none());
        }
    }

    #[test]
    fn test_grace_window_is_inclusive() {
        let snapshot = fresh_issue(1_000);
        for now in [1_030, 970] {
            assert!(
                detect_creation(&snapshot, &issue(), WatermarkState::Unseen, at(now), grace())
                    .is_some(),
                "now = {}",
                now
            );
        }
        for now in [1_031, 969] {
            assert!(
                detect_creation(&snapshot, &issue(), WatermarkState::Unseen, at(now), grace())
                    .is_none(),
                "now = {}",
                now
            );
        }
    }

    #[test]
    fn test_no_creation_for_seen_issue() {
        let snapshot = fresh_issue(1_000);
        assert!(detect_creation(
            &snapshot,
            &issue(),
            WatermarkState::Seen(at(990)),
            at(1_001),
            grace()
        )
        .is_none());
    }
}
