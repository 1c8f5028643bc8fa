//! Change events
//!
//! An [`Event`] is one classified change on one issue, ready for delivery.
//! The action and its payload live in the tagged [`Action`] enum, so each
//! kind carries exactly the fields it needs. Serialized, an event is a flat
//! JSON object with an `action` discriminator:
//!
//! ```json
//! { "key": "PROJ-1", "project": "PROJ", "action": "status",
//!   "from": "Open", "to": "Closed", "timestamp": 1709288130.0, ... }
//! ```

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Placeholder used when a change has no identifiable actor
pub const UNKNOWN_ACTOR: &str = "??";

/// Who performed a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub uid: String,
}

impl Actor {
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ACTOR, UNKNOWN_ACTOR)
    }

    /// Resolve from a Jira user, filling gaps with the unknown marker
    pub fn from_user(user: &jira_snapshot::User) -> Self {
        Self::new(
            user.display_name.as_deref().unwrap_or(UNKNOWN_ACTOR),
            user.uid().unwrap_or(UNKNOWN_ACTOR),
        )
    }
}

/// Where a comment-like event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSource {
    Comment,
    Worklog,
}

/// Classified action with its payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Issue created
    Create { description: Value },
    /// Resolution set on an unresolved issue
    Close { resolution: String },
    /// Resolution changed from one value to another
    Resolution { from: String, to: String },
    Status { from: String, to: String },
    Summary { from: String, to: String },
    Description { from: String, to: String },
    /// Assignee changed; an empty `to` means unassigned
    Assign { from: String, to: String },
    /// Comment or worklog entry added
    Comment {
        body: Value,
        #[serde(rename = "timespent", skip_serializing_if = "Option::is_none")]
        time_spent: Option<u64>,
    },
    /// Comment or worklog entry edited
    CommentEdit {
        body: Value,
        #[serde(rename = "timespent", skip_serializing_if = "Option::is_none")]
        time_spent: Option<u64>,
    },
}

impl Action {
    /// Wire name of the action
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Close { .. } => "close",
            Action::Resolution { .. } => "resolution",
            Action::Status { .. } => "status",
            Action::Summary { .. } => "summary",
            Action::Description { .. } => "description",
            Action::Assign { .. } => "assign",
            Action::Comment { .. } => "comment",
            Action::CommentEdit { .. } => "comment_edit",
        }
    }

    /// Worklog entries are the comment-like actions that carry a duration
    pub fn note_source(&self) -> Option<NoteSource> {
        match self {
            Action::Comment { time_spent, .. } | Action::CommentEdit { time_spent, .. } => {
                Some(match time_spent {
                    Some(_) => NoteSource::Worklog,
                    None => NoteSource::Comment,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Issue-level context shared by every event of one issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub key: String,
    pub link: String,
    pub summary: String,
    pub project: String,
}

impl IssueRef {
    pub fn from_snapshot(snapshot: &jira_snapshot::IssueSnapshot, link_base: &str) -> Self {
        Self {
            key: snapshot.key.clone(),
            link: format!("{}{}", link_base, snapshot.key),
            summary: snapshot
                .fields
                .summary
                .clone()
                .unwrap_or_else(|| "(No summary available)".to_string()),
            project: snapshot.project().to_string(),
        }
    }

    /// Chat-style link markup, `<link|KEY>`
    fn markup(&self) -> String {
        format!("<{}|{}>", self.link, self.key)
    }
}

/// A classified change, ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub key: String,
    pub link: String,
    pub summary: String,
    pub project: String,
    #[serde(flatten)]
    pub action: Action,
    pub author: String,
    pub author_uid: String,
    #[serde(serialize_with = "epoch_seconds")]
    pub timestamp: DateTime<Utc>,
    pub action_human_text: String,
}

impl Event {
    /// Build an event and render its sentence
    pub fn new(issue: &IssueRef, actor: &Actor, timestamp: DateTime<Utc>, action: Action) -> Self {
        let action_human_text = render_sentence(issue, &action);
        Self {
            key: issue.key.clone(),
            link: issue.link.clone(),
            summary: issue.summary.clone(),
            project: issue.project.clone(),
            action,
            author: actor.name.clone(),
            author_uid: actor.uid.clone(),
            timestamp,
            action_human_text,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.action.kind()
    }
}

/// Fixed per-action sentence. The actor is the implied subject and is
/// rendered by consumers from the `author` field.
pub fn render_sentence(issue: &IssueRef, action: &Action) -> String {
    let target = issue.markup();
    match action {
        Action::Create { .. } => format!("created {}: {}", issue.key, issue.summary),
        Action::Close { resolution } => format!("closed {} as _{}_.", target, resolution),
        Action::Resolution { from, to } => format!(
            "changed the resolution of {} from _{}_ to _{}_.",
            target, from, to
        ),
        Action::Status { to, .. } => format!("changed the status of {} to *{}*.", target, to),
        Action::Summary { .. } => format!("changed the summary of {}", target),
        Action::Description { .. } => format!("changed the description of {}", target),
        Action::Assign { from, to } => {
            if to.is_empty() {
                format!("unassigned *{}* from {}.", from, target)
            } else {
                format!("assigned *{}* to {}.", to, target)
            }
        }
        Action::Comment { .. } => match action.note_source() {
            Some(NoteSource::Worklog) => format!("added a worklog entry to {}", target),
            _ => format!("added a comment to {}", target),
        },
        Action::CommentEdit { .. } => match action.note_source() {
            Some(NoteSource::Worklog) => format!("edited a worklog entry on {}", target),
            _ => format!("edited a comment on {}", target),
        },
    }
}

fn epoch_seconds<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    let millis = t.timestamp_millis();
    s.serialize_f64(millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn issue() -> IssueRef {
        IssueRef {
            key: "PROJ-7".to_string(),
            link: "https://jira.example.org/browse/PROJ-7".to_string(),
            summary: "Login fails".to_string(),
            project: "PROJ".to_string(),
        }
    }

    fn alice() -> Actor {
        Actor::new("Alice", "alice")
    }

    #[test]
    fn test_status_event_wire_shape() {
        let at = Utc.timestamp_opt(1_709_288_130, 500_000_000).unwrap();
        let event = Event::new(
            &issue(),
            &alice(),
            at,
            Action::Status {
                from: "Open".to_string(),
                to: "In Progress".to_string(),
            },
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "key": "PROJ-7",
                "link": "https://jira.example.org/browse/PROJ-7",
                "summary": "Login fails",
                "project": "PROJ",
                "action": "status",
                "from": "Open",
                "to": "In Progress",
                "author": "Alice",
                "author_uid": "alice",
                "timestamp": 1_709_288_130.5,
                "action_human_text":
                    "changed the status of <https://jira.example.org/browse/PROJ-7|PROJ-7> to *In Progress*."
            })
        );
    }

    #[test]
    fn test_worklog_carries_timespent() {
        let event = Event::new(
            &issue(),
            &alice(),
            Utc.timestamp_opt(10, 0).unwrap(),
            Action::Comment {
                body: json!("profiling"),
                time_spent: Some(3600),
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "comment");
        assert_eq!(value["timespent"], 3600);
        assert!(event.action_human_text.starts_with("added a worklog entry"));
    }

    #[test]
    fn test_comment_has_no_timespent() {
        let value = serde_json::to_value(Event::new(
            &issue(),
            &alice(),
            Utc.timestamp_opt(10, 0).unwrap(),
            Action::CommentEdit {
                body: json!("typo fixed"),
                time_spent: None,
            },
        ))
        .unwrap();
        assert_eq!(value["action"], "comment_edit");
        assert!(value.get("timespent").is_none());
        assert_eq!(
            value["action_human_text"],
            "edited a comment on <https://jira.example.org/browse/PROJ-7|PROJ-7>"
        );
    }

    #[test]
    fn test_assign_and_unassign_sentences() {
        let assign = Action::Assign {
            from: String::new(),
            to: "bob".to_string(),
        };
        assert_eq!(
            render_sentence(&issue(), &assign),
            "assigned *bob* to <https://jira.example.org/browse/PROJ-7|PROJ-7>."
        );

        let unassign = Action::Assign {
            from: "alice".to_string(),
            to: String::new(),
        };
        assert_eq!(
            render_sentence(&issue(), &unassign),
            "unassigned *alice* from <https://jira.example.org/browse/PROJ-7|PROJ-7>."
        );
    }

    #[test]
    fn test_resolution_sentence_is_complete() {
        let text = render_sentence(
            &issue(),
            &Action::Resolution {
                from: "Fixed".to_string(),
                to: "Duplicate".to_string(),
            },
        );
        assert!(text.ends_with("from _Fixed_ to _Duplicate_."));
    }

    #[test]
    fn test_create_sentence() {
        let text = render_sentence(
            &issue(),
            &Action::Create {
                description: json!("steps to reproduce"),
            },
        );
        assert_eq!(text, "created PROJ-7: Login fails");
    }

    #[test]
    fn test_actor_from_partial_user() {
        let user = jira_snapshot::User {
            display_name: None,
            name: Some("carol".to_string()),
            account_id: None,
        };
        assert_eq!(Actor::from_user(&user), Actor::new("??", "carol"));
        assert_eq!(Actor::unknown(), Actor::new("??", "??"));
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let action = Action::Close {
            resolution: "Fixed".to_string(),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["action"], action.kind());
        assert_eq!(action.to_string(), "close");
    }
}
