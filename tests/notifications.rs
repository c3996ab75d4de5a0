//! End-to-end notification aggregation against a wiremock backend and a
//! file-backed read-state store.

use std::sync::Arc;

use campusfix::api::BackendClient;
use campusfix::config::Config;
use campusfix::models::NotificationType;
use campusfix::notification::{AggregatorOptions, FeedState, NotificationAggregator, NotificationFeed};
use campusfix::store::{Preferences, PrefsReadStateStore, ReadStateStore};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    _dir: tempfile::TempDir,
    state_file: std::path::PathBuf,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");
        Self {
            server: MockServer::start().await,
            _dir: dir,
            state_file,
        }
    }

    /// A fresh aggregator per call, as after a process restart.
    fn aggregator(&self, opts: AggregatorOptions) -> Arc<NotificationAggregator> {
        let cfg = Config {
            api_url: Url::parse(&self.server.uri()).unwrap(),
            ..Config::default()
        };
        let client = Arc::new(BackendClient::new(&cfg).unwrap());
        let prefs = Arc::new(Preferences::open(&self.state_file));
        let store = Arc::new(PrefsReadStateStore::new(prefs, 0));
        Arc::new(NotificationAggregator::new(client, store, opts))
    }

    async fn user(&self, email: &str, id: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/users/email/{}", email)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id, "email": email })))
            .mount(&self.server)
            .await;
    }

    async fn issues(&self, user_id: i64, ids: &[i64]) {
        let content: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "description": format!("Issue {}", id),
                    "category": "Other",
                    "status": "PENDING",
                    "latitude": 0.0,
                    "longitude": 0.0,
                    "userId": user_id
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/api/issues/user/{}", user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": content, "number": 0, "totalPages": 1, "last": true
            })))
            .mount(&self.server)
            .await;
    }

    async fn updates(&self, issue_id: i64, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/issues/{}/updates", issue_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn failing_updates(&self, issue_id: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/issues/{}/updates", issue_id)))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&self.server)
            .await;
    }

    /// Alice (user 1) with three issues and four updates across them.
    async fn seed_alice(&self) {
        self.user("alice@campus.edu", 1).await;
        self.issues(1, &[10, 20, 30]).await;
        self.updates(
            10,
            json!([{ "id": 101, "status": "PENDING", "comment": "Received", "timestamp": "2024-05-01T08:00:00" }]),
        )
        .await;
        self.updates(
            20,
            json!([
                { "id": 201, "status": "IN_PROGRESS", "timestamp": "2024-05-02T09:00:00" },
                { "id": 202, "status": "COMPLETED", "comment": "Fixed the pipe", "timestamp": "2024-05-03 17:45:00" }
            ]),
        )
        .await;
        self.updates(
            30,
            json!([{ "id": 301, "status": "PENDING", "timestamp": "2024-05-02T12:00:00" }]),
        )
        .await;
    }
}

#[tokio::test]
async fn test_aggregates_across_issues_newest_first() {
    let h = Harness::start().await;
    h.seed_alice().await;

    let list = h
        .aggregator(AggregatorOptions::default())
        .load("alice@campus.edu")
        .await
        .unwrap();

    let ids: Vec<_> = list.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["update_202", "update_301", "update_201", "update_101"]);
    for pair in list.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    let resolved = &list[0];
    assert_eq!(resolved.r#type, NotificationType::IssueResolved);
    assert_eq!(resolved.message, "Issue resolved, check now");
    assert_eq!(list[3].message, "Received");
}

#[tokio::test]
async fn test_one_failing_issue_among_three() {
    let h = Harness::start().await;
    h.user("alice@campus.edu", 1).await;
    h.issues(1, &[10, 20, 30]).await;
    h.updates(10, json!([{ "id": 101, "status": "PENDING", "timestamp": "2024-05-01T08:00:00" }]))
        .await;
    h.failing_updates(20).await;
    h.updates(30, json!([{ "id": 301, "status": "PENDING", "timestamp": "2024-05-02T12:00:00" }]))
        .await;

    let list = h
        .aggregator(AggregatorOptions::default())
        .load("alice@campus.edu")
        .await
        .unwrap();
    let ids: Vec<_> = list.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["update_301", "update_101"]);
}

#[tokio::test]
async fn test_read_mark_survives_restart_and_reload() {
    let h = Harness::start().await;
    h.seed_alice().await;

    let feed = NotificationFeed::new(h.aggregator(AggregatorOptions::default()), "alice@campus.edu");
    feed.refresh().await;
    assert_eq!(feed.unread_count(), 4);
    assert!(feed.mark_read("update_201").unwrap());
    assert!(feed.mark_read("update_201").unwrap());
    assert_eq!(feed.unread_count(), 3);

    // New aggregator, new store instance, same file.
    let reloaded = h
        .aggregator(AggregatorOptions::default())
        .load("alice@campus.edu")
        .await
        .unwrap();
    let read: Vec<_> = reloaded.iter().filter(|n| n.read).map(|n| n.id.as_str()).collect();
    assert_eq!(read, vec!["update_201"]);
}

#[tokio::test]
async fn test_read_state_is_per_user() {
    let h = Harness::start().await;
    h.seed_alice().await;
    // Bob sees the same issue 20 (shared report) and so the same notification ids.
    h.user("bob@campus.edu", 2).await;
    h.issues(2, &[20]).await;

    let agg = h.aggregator(AggregatorOptions::default());
    agg.read_state().mark_read("alice@campus.edu", "update_202").unwrap();

    let bob = agg.load("bob@campus.edu").await.unwrap();
    assert_eq!(bob.len(), 2);
    assert!(bob.iter().all(|n| !n.read));

    let alice = agg.load("alice@campus.edu").await.unwrap();
    assert!(alice.iter().any(|n| n.id == "update_202" && n.read));
}

#[tokio::test]
async fn test_mark_read_twice_leaves_same_set() {
    let h = Harness::start().await;
    let store = PrefsReadStateStore::new(Arc::new(Preferences::open(&h.state_file)), 0);

    store.mark_read("alice@campus.edu", "update_1").unwrap();
    let once = store.read_ids("alice@campus.edu").unwrap();
    store.mark_read("alice@campus.edu", "update_1").unwrap();
    assert_eq!(store.read_ids("alice@campus.edu").unwrap(), once);
}

#[tokio::test]
async fn test_parallel_fetch_matches_sequential() {
    let h = Harness::start().await;
    h.seed_alice().await;

    let sequential = h
        .aggregator(AggregatorOptions::default())
        .load("alice@campus.edu")
        .await
        .unwrap();
    let parallel = h
        .aggregator(AggregatorOptions {
            concurrency: 3,
            ..AggregatorOptions::default()
        })
        .load("alice@campus.edu")
        .await
        .unwrap();
    assert_eq!(sequential, parallel);
}

#[tokio::test]
async fn test_unknown_user_gives_empty_feed_and_banner() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/email/nobody@campus.edu"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;

    let feed = NotificationFeed::new(h.aggregator(AggregatorOptions::default()), "nobody@campus.edu");
    let mut rx = feed.subscribe();

    match feed.refresh().await {
        FeedState::Failed { message } => assert!(message.contains("retry")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(feed.notifications().is_empty());
    assert_eq!(feed.unread_count(), 0);
    assert!(rx.has_changed().unwrap());
    assert!(matches!(*rx.borrow_and_update(), FeedState::Failed { .. }));
}

#[tokio::test]
async fn test_retry_after_failure_recovers() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/email/alice@campus.edu"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    h.seed_alice().await;

    let feed = NotificationFeed::new(h.aggregator(AggregatorOptions::default()), "alice@campus.edu");
    assert!(matches!(feed.refresh().await, FeedState::Failed { .. }));
    assert!(matches!(feed.refresh().await, FeedState::Loaded(ref l) if l.len() == 4));
}

#[tokio::test]
async fn test_mark_all_read_then_grouping() {
    let h = Harness::start().await;
    h.seed_alice().await;

    let feed = NotificationFeed::new(h.aggregator(AggregatorOptions::default()), "alice@campus.edu");
    feed.refresh().await;
    assert_eq!(feed.mark_all_read().unwrap(), 4);
    assert_eq!(feed.unread_count(), 0);
    assert_eq!(feed.mark_all_read().unwrap(), 0);

    let now = chrono::DateTime::parse_from_rfc3339("2024-05-03T20:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let groups = feed.grouped(now);
    assert_eq!(groups[0].items.len(), 1);
    assert_eq!(groups[0].items[0].id, "update_202");
    assert_eq!(groups[1].items.len(), 2);
    assert_eq!(groups[2].items.len(), 1);

    assert_eq!(feed.filtered(NotificationType::UpdateRequest).len(), 1);
}
