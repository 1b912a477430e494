//! Read-only HTTP projections over the post store.
mod errors;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use errors::ServerError;

use crate::domain::model::StoredPost;
use crate::ports::clock::Clock;
use crate::ports::store::{PostFilter, PostStats, PostStore};

const DEFAULT_TOP_LIMIT: i64 = 20;
const MAX_TOP_LIMIT: i64 = 100;
const DEFAULT_TOP_HOURS: i64 = 24;
const DEFAULT_RECENT_LIMIT: i64 = 50;
const DEFAULT_CATEGORY_LIMIT: i64 = 50;
const MAX_RECENT_LIMIT: i64 = 200;
const MAX_CATEGORY_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn PostStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub posts: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn resolve(&self, default: i64, max: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
    /// Trailing window in hours; defaults to a day.
    pub hours: Option<i64>,
}

impl TopQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_TOP_LIMIT)
            .clamp(1, MAX_TOP_LIMIT)
    }

    /// A window too wide to represent covers every post.
    fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let hours = self.hours.unwrap_or(DEFAULT_TOP_HOURS).max(1);
        Duration::try_hours(hours).and_then(|window| now.checked_sub_signed(window))
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/posts", get(list_posts))
        .route("/posts/top", get(top_posts))
        .route("/posts/recent", get(recent_posts))
        .route("/posts/category/{category}", get(posts_by_category))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> Result<Json<Health>, ServerError> {
    let posts = state.store.count().await?;
    Ok(Json(Health {
        status: "ok",
        posts,
    }))
}

async fn stats(State(state): State<ApiState>) -> Result<Json<PostStats>, ServerError> {
    let now = state.clock.now().await;
    Ok(Json(state.store.stats(now).await?))
}

async fn list_posts(
    State(state): State<ApiState>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<StoredPost>>, ServerError> {
    let now = state.clock.now().await;
    Ok(Json(state.store.list(&filter, now).await?))
}

async fn top_posts(
    State(state): State<ApiState>,
    Query(q): Query<TopQuery>,
) -> Result<Json<Vec<StoredPost>>, ServerError> {
    let now = state.clock.now().await;
    let posts = state
        .store
        .top_by_engagement(q.limit(), q.since(now))
        .await?;
    Ok(Json(posts))
}

async fn recent_posts(
    State(state): State<ApiState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<StoredPost>>, ServerError> {
    let posts = state.store.recent(q.resolve(DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT)).await?;
    Ok(Json(posts))
}

async fn posts_by_category(
    State(state): State<ApiState>,
    Path(category): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<StoredPost>>, ServerError> {
    let posts = state
        .store
        .by_category(&category, q.resolve(DEFAULT_CATEGORY_LIMIT, MAX_CATEGORY_LIMIT))
        .await?;
    if posts.is_empty() {
        return Err(ServerError::new(
            StatusCode::NOT_FOUND,
            format!("no posts in category '{category}'"),
        ));
    }
    Ok(Json(posts))
}
