//! Postgres-backed post store.
mod connection;
mod migrations;
mod posts;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;

use crate::domain::model::{PostgresConfig, ScoredPost, StoredPost};
use crate::ports::store::{PostFilter, PostStats, PostStore, StoreError, UpsertReport};

pub struct PostgresStore {
    pool: PgPool,
    timezone: Tz,
}

impl PostgresStore {
    pub async fn new(cfg: &PostgresConfig, timezone: &Tz) -> Result<Self, StoreError> {
        let pool = connection::create_pool(cfg, timezone).await?;
        Ok(Self {
            pool,
            timezone: *timezone,
        })
    }
}

#[async_trait::async_trait]
impl PostStore for PostgresStore {
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
