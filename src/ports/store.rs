//! Storage abstraction for posts: idempotent batch upsert, existence checks, and
//! the read-only projections served downstream.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::model::{ScoredPost, StoredPost};

pub const MAX_PAGE_SIZE: i64 = 500;
pub const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or unusable. Fatal to a run.
    #[error("store connection: {0}")]
    Connection(String),
    #[error("malformed post: {0}")]
    Malformed(String),
    #[error("store query: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Filters for the paginated listing. Reposts are always excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    pub category: Option<String>,
    pub author: Option<String>,
    pub min_engagement: Option<i64>,
    /// Only posts created in the trailing `hours`.
    pub hours: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PostFilter {
    pub fn page_size(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub total_posts: i64,
    pub posts_last_hour: i64,
    pub posts_last_24h: i64,
    pub unique_authors: i64,
    pub categories: BTreeMap<String, i64>,
}

#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    /// Creates the table and indexes and adds any missing columns. Idempotent.
    async fn migrate(&self) -> Result<(), StoreError>;

    async fn exists(&self, post_id: &str) -> Result<bool, StoreError>;

    /// Inserts unseen posts and refreshes engagement on known ones. Bad items are
    /// logged and counted; only connectivity failures return `Err`.
    async fn upsert_batch(
        &self,
        posts: &[ScoredPost],
        ingested_at: DateTime<Utc>,
    ) -> Result<UpsertReport, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Highest total engagement first. `since` limits to posts created at or after it.
    async fn top_by_engagement(
        &self,
        limit: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredPost>, StoreError>;

    async fn recent(&self, limit: i64) -> Result<Vec<StoredPost>, StoreError>;

    async fn by_category(&self, category: &str, limit: i64) -> Result<Vec<StoredPost>, StoreError>;

    async fn list(&self, filter: &PostFilter, now: DateTime<Utc>) -> Result<Vec<StoredPost>, StoreError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<PostStats, StoreError>;
}
