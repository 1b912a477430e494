mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use postharvest::app::context::AppContext;
use postharvest::app::orchestrator::{Orchestrator, RunError};
use postharvest::domain::model::Category;
use postharvest::infra::sqlite_repo::SqliteStore;
use postharvest::ports::store::PostStore;
use support::{
    fixed_now, test_config, FakeBrowser, FakeFeed, FakePost, FixedClock, FixedRng, MemoryStore,
};
use tempfile::TempDir;

const REPOST_TEXT: &str = "RT @elsewhere: Breaking news from the government on the economy today";

fn feeds() -> Vec<(&'static str, FakeFeed)> {
    vec![
        (
            "channelstv",
            FakeFeed::single(vec![
                FakePost::recent("c1", 5),
                FakePost::recent("c2", 10).with_likes("2"),
                FakePost::recent("c3", 15).with_text(REPOST_TEXT),
            ]),
        ),
        (
            "arisenews",
            FakeFeed::growing(vec![
                vec![FakePost::recent("a1", 2)],
                vec![FakePost::recent("a2", 20)],
            ]),
        ),
    ]
}

#[tokio::test]
async fn full_run_gates_scores_and_stores() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteStore::new(&dir.path().join("posts.db"), &chrono_tz::UTC)
            .await
            .unwrap(),
    );
    store.migrate().await.unwrap();

    let cfg = test_config(vec![
        (Category::NewsOutlets, vec!["channelstv", "arisenews"]),
        (Category::Journalists, vec!["ghost"]),
    ]);
    let browser = FakeBrowser::new(feeds());
    let log = Arc::clone(&browser.log);
    let ctx = AppContext::new(
        cfg,
        Arc::clone(&store),
        browser,
        FixedClock::at(fixed_now()),
        FixedRng(0.99),
    );
    let mut orchestrator = Orchestrator::new(ctx);

    let report = orchestrator.run_once().await.unwrap();

    assert_eq!(report.fetched, 5);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.stored, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed_accounts, vec!["ghost".to_string()]);
    assert!(report.escalated_accounts.is_empty());

    let mut ids: Vec<_> = store
        .recent(10)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.post_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a1", "a2", "c1"]);

    let top = store.top_by_engagement(1, None).await.unwrap();
    // breaking, news, government, economy
    assert_eq!(top[0].relevance_score, 4);
    assert_eq!(top[0].ingested_at_ms, fixed_now().timestamp_millis());

    // two accounts once each, the failing one three times
    assert_eq!(log.opened.load(Ordering::SeqCst), 5);
    assert_eq!(log.closed.load(Ordering::SeqCst), 5);
    assert!(log
        .user_agents
        .lock()
        .unwrap()
        .iter()
        .all(|ua| ua == "ua-two"));
}

#[tokio::test]
async fn second_run_finds_nothing_new() {
    let store: Arc<dyn PostStore> = Arc::new(MemoryStore::default());
    let cfg = test_config(vec![(Category::NewsOutlets, vec!["channelstv", "arisenews"])]);
    let ctx = AppContext::new(
        cfg,
        Arc::clone(&store),
        FakeBrowser::new(feeds()),
        FixedClock::at(fixed_now()),
        FixedRng(0.0),
    );
    let mut orchestrator = Orchestrator::new(ctx);

    let first = orchestrator.run_once().await.unwrap();
    assert_eq!(first.stored, 3);

    let second = orchestrator.run_once().await.unwrap();
    // c2 and c3 were gated out, never stored, so they come back as drafts
    assert_eq!(second.fetched, 2);
    assert_eq!(second.accepted, 0);
    assert_eq!(second.stored, 0);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn repeated_failures_escalate_on_the_fourth_run() {
    let cfg = test_config(vec![(Category::Grassroots, vec!["ghost"])]);
    let ctx = AppContext::new(
        cfg,
        Arc::new(MemoryStore::default()),
        FakeBrowser::new(vec![]),
        FixedClock::at(fixed_now()),
        FixedRng(0.5),
    );
    let mut orchestrator = Orchestrator::new(ctx);

    for _ in 0..3 {
        let report = orchestrator.run_once().await.unwrap();
        assert_eq!(report.failed_accounts, vec!["ghost".to_string()]);
        assert!(report.escalated_accounts.is_empty());
    }
    let report = orchestrator.run_once().await.unwrap();
    assert_eq!(report.escalated_accounts, vec!["ghost".to_string()]);
    assert_eq!(orchestrator.tracker().count("ghost"), 4);
}

#[tokio::test]
async fn lost_store_aborts_the_run_and_still_closes_the_page() {
    let store = Arc::new(MemoryStore::default());
    store.offline.store(true, Ordering::SeqCst);
    let cfg = test_config(vec![(Category::NewsOutlets, vec!["channelstv", "arisenews"])]);
    let browser = FakeBrowser::new(feeds());
    let log = Arc::clone(&browser.log);
    let ctx = AppContext::new(
        cfg,
        store,
        browser,
        FixedClock::at(fixed_now()),
        FixedRng(0.0),
    );
    let mut orchestrator = Orchestrator::new(ctx);

    let err = orchestrator.run_once().await.unwrap_err();

    assert!(matches!(err, RunError::Store(e) if e.is_connection()));
    assert_eq!(log.opened.load(Ordering::SeqCst), 1);
    assert_eq!(log.closed.load(Ordering::SeqCst), 1);
}
