mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use postharvest::api::{router, ApiState};
use postharvest::domain::model::Category;
use postharvest::ports::store::PostStore;
use serde_json::Value;
use support::{draft, fixed_now, scored, FixedClock, MemoryStore};
use tower::ServiceExt;

const TEXT: &str = "Government confirms new economy measures after the cabinet meeting today";

async fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    let mut activist = draft("b", TEXT, 900);
    activist.category = Category::Activists;
    let batch = vec![
        scored(draft("a", TEXT, 40)),
        scored(activist),
        scored(draft("c", TEXT, 300)),
    ];
    store.upsert_batch(&batch, fixed_now()).await.unwrap();
    store
}

fn state(store: Arc<MemoryStore>) -> ApiState {
    ApiState {
        store,
        clock: Arc::new(FixedClock::at(fixed_now())),
    }
}

async fn get(state: ApiState, uri: &str) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|p| p["post_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_reports_the_post_count() {
    let (status, body) = get(state(seeded().await), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["posts"], 3);
}

#[tokio::test]
async fn top_posts_are_ordered_and_limited() {
    let (status, body) = get(state(seeded().await), "/posts/top?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec!["b", "c"]);
}

#[tokio::test]
async fn top_posts_default_to_the_last_day() {
    let store = seeded().await;
    let mut old = draft("old", TEXT, 50_000);
    old.created_at = fixed_now() - chrono::Duration::hours(30);
    store.upsert_batch(&[scored(old)], fixed_now()).await.unwrap();

    let (_, body) = get(state(Arc::clone(&store)), "/posts/top").await;
    assert_eq!(ids(&body), vec!["b", "c", "a"]);

    let (_, body) = get(state(store), "/posts/top?hours=48&limit=1").await;
    assert_eq!(ids(&body), vec!["old"]);
}

#[tokio::test]
async fn limits_are_capped_per_endpoint() {
    let store = Arc::new(MemoryStore::default());
    let batch: Vec<_> = (0..250)
        .map(|i| scored(draft(&format!("p{i}"), TEXT, 40 + i)))
        .collect();
    store.upsert_batch(&batch, fixed_now()).await.unwrap();

    let (_, body) = get(state(Arc::clone(&store)), "/posts/top?limit=500").await;
    assert_eq!(body.as_array().unwrap().len(), 100);

    let (_, body) = get(state(Arc::clone(&store)), "/posts/recent?limit=500").await;
    assert_eq!(body.as_array().unwrap().len(), 200);

    let (_, body) = get(state(store), "/posts/category/news_outlets?limit=500").await;
    assert_eq!(body.as_array().unwrap().len(), 200);
}

#[tokio::test]
async fn category_listing_and_missing_category() {
    let store = seeded().await;

    let (status, body) = get(state(Arc::clone(&store)), "/posts/category/activists").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = get(state(store), "/posts/category/grassroots").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn filtered_listing_reads_query_parameters() {
    let (status, body) = get(
        state(seeded().await),
        "/posts?category=news_outlets&limit=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["category"], "news_outlets");
}

#[tokio::test]
async fn stats_group_by_category() {
    let (status, body) = get(state(seeded().await), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_posts"], 3);
    assert_eq!(body["categories"]["news_outlets"], 2);
    assert_eq!(body["categories"]["activists"], 1);
}

#[tokio::test]
async fn unreachable_store_is_503() {
    let store = seeded().await;
    store.offline.store(true, Ordering::SeqCst);
    let (status, body) = get(state(store), "/posts/recent").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "unavailable");
}
