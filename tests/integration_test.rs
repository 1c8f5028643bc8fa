//! Integration tests for jira-pubsub
//!
//! These tests drive the full workflow from config loading through polling,
//! classification, publishing and watermark persistence, with in-memory
//! stand-ins for Jira and the pubsub endpoint.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jira_pubsub::bridge::{Bridge, BridgeConfig};
use jira_pubsub::config::{validate_settings_result, Settings};
use jira_pubsub::integrations::jira::decode_search_response;
use jira_pubsub::integrations::{EventSink, IssueSource};
use jira_pubsub::routing::RouteTemplate;
use jira_pubsub::{BridgeError, ChangeTracker, Event, Result, WatermarkStore};
use jira_snapshot::IssueSnapshot;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const T0: i64 = 1_700_000_000;

fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + offset, 0).unwrap()
}

/// Jira-style timestamp, e.g. `2023-11-14T22:13:20.000+0000`
fn jt(offset: i64) -> String {
    at(offset).format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}

fn user(name: &str) -> Value {
    json!({ "displayName": name, "name": name.to_lowercase() })
}

/// A search response page as Jira returns it
fn search_page(issues: Vec<Value>) -> Value {
    json!({ "startAt": 0, "maxResults": 50, "total": issues.len(), "issues": issues })
}

fn busy_issue() -> Value {
    json!({
        "id": "10042",
        "key": "OPS-42",
        "fields": {
            "summary": "Disk full on build agent",
            "description": "The /var partition is at 100%",
            "created": jt(-86_400),
            "updated": jt(120),
            "creator": user("Carol"),
            "comment": {
                "comments": [
                    { "author": user("Dave"), "body": "Looking", "created": jt(-600), "updated": jt(-600) },
                    { "author": user("Dave"), "body": "On it", "created": jt(30), "updated": jt(30) },
                    { "author": user("Erin"), "body": "Edited", "created": jt(-300), "updated": jt(90) }
                ]
            },
            "worklog": {
                "worklogs": [
                    { "author": user("Dave"), "comment": "cleanup", "timeSpentSeconds": 1800,
                      "created": jt(100), "updated": jt(100) }
                ]
            }
        },
        "changelog": {
            "histories": [
                {
                    "id": "1", "author": user("Carol"), "created": jt(-500),
                    "items": [ { "field": "status", "fromString": "Open", "toString": "Triage" } ]
                },
                {
                    "id": "2", "author": user("Dave"), "created": jt(60),
                    "items": [
                        { "field": "resolution", "fromString": null, "toString": "Fixed" },
                        { "field": "status", "fromString": "In Progress", "toString": "Closed" },
                        { "field": "labels", "fromString": "", "toString": "disk" }
                    ]
                },
                {
                    "id": "3", "author": user("Alice"), "created": jt(110),
                    "items": [ { "field": "assignee", "fromString": "Alice", "toString": null } ]
                }
            ]
        }
    })
}

fn snapshots(page: Value) -> Vec<IssueSnapshot> {
    decode_search_response(page).unwrap()
}

/// Source that returns scripted batches; `None` simulates an outage
struct FakeJira {
    batches: Mutex<VecDeque<Option<Vec<IssueSnapshot>>>>,
}

impl FakeJira {
    fn new(batches: Vec<Option<Vec<IssueSnapshot>>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl IssueSource for FakeJira {
    async fn fetch(&self) -> Result<Vec<IssueSnapshot>> {
        match self.batches.lock().unwrap().pop_front() {
            Some(Some(batch)) => Ok(batch),
            Some(None) => Err(BridgeError::Integration(
                "Jira search failed: HTTP 502 Bad Gateway: ".to_string(),
            )),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "fake-jira"
    }
}

/// Sink that routes events like the HTTP publisher and records the targets
#[derive(Clone)]
struct FakePubSub {
    route: RouteTemplate,
    delivered: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakePubSub {
    fn new(template: &str) -> Self {
        Self {
            route: RouteTemplate::parse(template).unwrap(),
            delivered: Arc::default(),
        }
    }
}

#[async_trait]
impl EventSink for FakePubSub {
    async fn publish(&self, event: &Event) -> Result<()> {
        let target = self.route.render(event)?;
        let body = serde_json::to_value(event)?;
        self.delivered
            .lock()
            .unwrap()
            .push((target.to_string(), body));
        Ok(())
    }

    fn name(&self) -> &str {
        "fake-pubsub"
    }
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("jira-to-pubsub.yaml");
    let yaml = format!(
        "jira_url: https://jira.example.org/rest/api/2/search?jql=updated%3E-5m&expand=changelog\n\
         jira_user: bridge-bot\n\
         jira_pass: hunter2\n\
         jira_base: https://jira.example.org/browse/\n\
         pubsub_url: https://pubsub.example.org/jira/{{project}}/{{action}}\n\
         polling_internal: 10\n\
         state_file: {}\n\
         {}",
        dir.join("watermarks.json").display(),
        extra
    );
    std::fs::write(&path, yaml).unwrap();
    path
}

mod config_tests {
    use super::*;

    #[test]
    fn test_load_and_validate() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "grace_window: 60\n");

        let settings = Settings::load(&path).unwrap();
        validate_settings_result(&settings).unwrap();
        assert_eq!(settings.poll_interval, 10);
        assert_eq!(settings.password().unwrap(), "hunter2");

        let config = BridgeConfig::from_settings(&settings);
        assert_eq!(config.poll_interval, std::time::Duration::from_secs(10));
        assert_eq!(config.grace_window, chrono::Duration::seconds(60));
        assert_eq!(config.state_file, Some(dir.path().join("watermarks.json")));
    }

    #[test]
    fn test_invalid_route_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(
            &path,
            "jira_url: https://jira.example.org/search\n\
             jira_user: bot\n\
             jira_pass: x\n\
             jira_base: https://jira.example.org/browse/\n\
             pubsub_url: https://pubsub.example.org/{summary}\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        let err = validate_settings_result(&settings).unwrap_err();
        assert!(err.to_string().contains("pubsub_url"));
    }
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_busy_issue_classification_and_wire_shape() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(write_config(dir.path(), "")).unwrap();

        let mut store = WatermarkStore::new(at(0));
        store.mark_seen("OPS-42");

        let sink = FakePubSub::new(&settings.pubsub_url);
        let delivered = sink.delivered.clone();
        let source = FakeJira::new(vec![Some(snapshots(search_page(vec![busy_issue()])))]);
        let mut bridge = Bridge::with_store(
            BridgeConfig::from_settings(&settings),
            Box::new(source),
            Box::new(sink),
            store,
        );

        let report = bridge.poll_at(at(130)).await;
        assert_eq!(report.issues, 1);
        assert_eq!(report.published, report.events);

        let delivered = delivered.lock().unwrap();
        let actions: Vec<_> = delivered
            .iter()
            .map(|(_, body)| body["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            actions,
            vec!["close", "status", "assign", "comment", "comment_edit", "comment"]
        );

        let (target, close) = &delivered[0];
        assert_eq!(target, "https://pubsub.example.org/jira/OPS/close");
        assert_eq!(close["key"], "OPS-42");
        assert_eq!(close["link"], "https://jira.example.org/browse/OPS-42");
        assert_eq!(close["resolution"], "Fixed");
        assert_eq!(close["author"], "Dave");
        assert_eq!(close["author_uid"], "dave");
        assert_eq!(close["timestamp"].as_f64().unwrap(), (T0 + 60) as f64);

        let (_, unassign) = &delivered[2];
        assert_eq!(unassign["from"], "Alice");
        assert_eq!(unassign["to"], "");
        assert!(unassign["action_human_text"]
            .as_str()
            .unwrap()
            .starts_with("unassigned *Alice*"));

        let (_, edit) = &delivered[4];
        assert_eq!(edit["body"], "Edited");
        assert_eq!(edit["timestamp"].as_f64().unwrap(), (T0 + 90) as f64);

        let (_, worklog) = &delivered[5];
        assert_eq!(worklog["timespent"], 1800);
        assert_eq!(worklog["body"], "cleanup");

        assert_eq!(bridge.store().get("OPS-42"), at(110));
    }

    #[tokio::test]
    async fn test_new_issue_then_follow_up_change() {
        let created = json!({
            "key": "OPS-43",
            "fields": {
                "summary": "New alert",
                "created": jt(1_000),
                "reporter": user("Frank")
            }
        });
        let mut changed = created.clone();
        changed["changelog"] = json!({
            "histories": [{
                "author": user("Frank"), "created": jt(1_050),
                "items": [ { "field": "summary", "fromString": "New alert", "toString": "Old alert" } ]
            }]
        });

        let sink = FakePubSub::new("https://pubsub.example.org/jira/{key}");
        let delivered = sink.delivered.clone();
        let source = FakeJira::new(vec![
            Some(snapshots(search_page(vec![created]))),
            None,
            Some(snapshots(search_page(vec![changed]))),
        ]);
        let mut bridge = Bridge::with_store(
            BridgeConfig::new("https://jira.example.org/browse/"),
            Box::new(source),
            Box::new(sink),
            WatermarkStore::new(at(0)),
        );

        bridge.poll_at(at(1_005)).await;
        let outage = bridge.poll_at(at(1_030)).await;
        assert!(outage.fetch_failed);
        bridge.poll_at(at(1_060)).await;

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, "https://pubsub.example.org/jira/OPS-43");
        assert_eq!(delivered[0].1["action"], "create");
        assert_eq!(delivered[0].1["author"], "Frank");
        assert_eq!(delivered[0].1["description"], "(No description available)");
        assert_eq!(delivered[1].1["action"], "summary");
        assert_eq!(delivered[1].1["to"], "Old alert");
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_watermarks_survive_restart() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(write_config(dir.path(), "")).unwrap();
        let config = BridgeConfig::from_settings(&settings);
        let page = search_page(vec![busy_issue()]);

        let mut store = WatermarkStore::new(at(0));
        store.mark_seen("OPS-42");
        let first_sink = FakePubSub::new(&settings.pubsub_url);
        let first_delivered = first_sink.delivered.clone();
        let mut first = Bridge::with_store(
            config.clone(),
            Box::new(FakeJira::new(vec![Some(snapshots(page.clone()))])),
            Box::new(first_sink),
            store,
        );
        first.poll_at(at(130)).await;
        assert_eq!(first_delivered.lock().unwrap().len(), 6);
        drop(first);

        // a fresh process picks up where the last one stopped
        let second_sink = FakePubSub::new(&settings.pubsub_url);
        let second_delivered = second_sink.delivered.clone();
        let mut second = Bridge::new(
            config,
            Box::new(FakeJira::new(vec![Some(snapshots(page))])),
            Box::new(second_sink),
        )
        .unwrap();
        assert_eq!(second.store().get("OPS-42"), at(110));

        let report = second.poll_once().await;
        assert_eq!(report.events, 0);
        assert!(second_delivered.lock().unwrap().is_empty());
    }
}

mod replay_tests {
    use super::*;

    #[test]
    fn test_replay_saved_response() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(
            &path,
            serde_json::to_string_pretty(&search_page(vec![busy_issue(), json!({ "key": 7 })]))
                .unwrap(),
        )
        .unwrap();

        let body: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let issues = decode_search_response(body).unwrap();
        assert_eq!(issues.len(), 1);

        let tracker = ChangeTracker::new("https://jira.example.org/browse/");
        let events = tracker.replay(&issues, at(95), at(200));
        let kinds: Vec<_> = events.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["assign", "comment"]);

        let everything = tracker.replay(&issues, DateTime::<Utc>::UNIX_EPOCH, at(200));
        assert_eq!(everything.len(), 8);
    }
}
