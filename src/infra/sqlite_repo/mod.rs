//! SQLite-backed post store. Each upserted item is its own implicit transaction.
mod connection;
mod migrations;
mod posts;

use std::path::Path;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;

use crate::domain::model::{ScoredPost, StoredPost};
use crate::ports::store::{PostFilter, PostStats, PostStore, StoreError, UpsertReport};

pub struct SqliteStore {
    pool: SqlitePool,
    timezone: Tz,
}

impl SqliteStore {
    pub async fn new(db_path: &Path, timezone: &Tz) -> Result<Self, StoreError> {
        let pool = connection::create_pool(db_path).await?;
        Ok(Self {
            pool,
            timezone: *timezone,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl PostStore for SqliteStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        migrations::migrate(&self.pool).await
    }

    async fn exists(&self, post_id: &str) -> Result<bool, StoreError> {
        posts::exists(&self.pool, post_id).await
    }

    async fn upsert_batch(
        &self,
        batch: &[ScoredPost],
        ingested_at: DateTime<Utc>,
    ) -> Result<UpsertReport, StoreError> {
        posts::upsert_batch(&self.pool, batch, ingested_at, &self.timezone).await
    }

    async fn count(&self) -> Result<i64, StoreError> {
        posts::count(&self.pool).await
    }

    async fn top_by_engagement(
        &self,
        limit: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredPost>, StoreError> {
        posts::top_by_engagement(&self.pool, limit, since).await
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredPost>, StoreError> {
        posts::recent(&self.pool, limit).await
    }

    async fn by_category(&self, category: &str, limit: i64) -> Result<Vec<StoredPost>, StoreError> {
        posts::by_category(&self.pool, category, limit).await
    }

    async fn list(&self, filter: &PostFilter, now: DateTime<Utc>) -> Result<Vec<StoredPost>, StoreError> {
        posts::list(&self.pool, filter, now).await
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<PostStats, StoreError> {
        posts::stats(&self.pool, now).await
    }
}
