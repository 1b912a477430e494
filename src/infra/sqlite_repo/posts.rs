use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::domain::model::{ScoredPost, SqlDialect, StoredPost};
use crate::infra::sql::{classify, since_ms, PostRecord, PostSql, SqlArg, UpsertRow};
use crate::ports::store::{PostFilter, PostStats, StoreError, UpsertReport};

const SQL: PostSql = PostSql::new(SqlDialect::Sqlite);

pub async fn exists(pool: &SqlitePool, post_id: &str) -> Result<bool, StoreError> {
    let n: i64 = sqlx::query_scalar(&SQL.exists())
        .bind(post_id)
        .fetch_one(pool)
        .await
        .map_err(|e| classify(e, "exists"))?;
    Ok(n > 0)
}

/// Each item commits on its own; a bad item never takes the rest of the batch down.
pub async fn upsert_batch(
    pool: &SqlitePool,
    posts: &[ScoredPost],
    ingested_at: DateTime<Utc>,
    zone: &Tz,
) -> Result<UpsertReport, StoreError> {
    let stmt = SQL.upsert();
    let mut report = UpsertReport::default();

    for post in posts {
        let row = match UpsertRow::prepare(post, ingested_at, zone) {
            Ok(row) => row,
            Err(e) => {
                error!(post_id = %post.draft.post_id, error = %e, "Skipping post");
                report.skipped += 1;
                continue;
            }
        };

        let res = sqlx::query(&stmt)
            .bind(&row.post_id)
            .bind(&row.author_handle)
            .bind(row.author_verified)
            .bind(&row.category)
            .bind(&row.text)
            .bind(row.created_at_ms)
            .bind(&row.created_at_text)
            .bind(row.likes)
            .bind(row.reposts)
            .bind(row.replies)
            .bind(&row.permalink)
            .bind(row.is_repost)
            .bind(row.relevance_score)
            .bind(row.ingested_at_ms)
            .bind(&row.ingested_at_text)
            .execute(pool)
            .await;

        match res.map_err(|e| classify(e, "upsert post")) {
            Ok(_) => {
                debug!(post_id = %row.post_id, "Stored post");
                report.stored += 1;
            }
            Err(e) if e.is_connection() => return Err(e),
            Err(e) => {
                error!(post_id = %row.post_id, error = %e, "Failed to store post");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

pub async fn count(pool: &SqlitePool) -> Result<i64, StoreError> {
    sqlx::query_scalar(&SQL.count())
        .fetch_one(pool)
        .await
        .map_err(|e| classify(e, "count"))
}

pub async fn top_by_engagement(
    pool: &SqlitePool,
    limit: i64,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<StoredPost>, StoreError> {
    let rows: Vec<PostRecord> = sqlx::query_as(&SQL.top_by_engagement())
        .bind(since_ms(since))
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| classify(e, "top by engagement"))?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<StoredPost>, StoreError> {
    let rows: Vec<PostRecord> = sqlx::query_as(&SQL.recent())
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| classify(e, "recent"))?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn by_category(
    pool: &SqlitePool,
    category: &str,
    limit: i64,
) -> Result<Vec<StoredPost>, StoreError> {
    let rows: Vec<PostRecord> = sqlx::query_as(&SQL.by_category())
        .bind(category)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| classify(e, "by category"))?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn list(
    pool: &SqlitePool,
    filter: &PostFilter,
    now: DateTime<Utc>,
) -> Result<Vec<StoredPost>, StoreError> {
    let (sql, args) = SQL.list(filter, now);
    let mut query = sqlx::query_as::<_, PostRecord>(&sql);
    for arg in args {
        query = match arg {
            SqlArg::Text(s) => query.bind(s),
            SqlArg::Int(n) => query.bind(n),
        };
    }
    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| classify(e, "list posts"))?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn stats(pool: &SqlitePool, now: DateTime<Utc>) -> Result<PostStats, StoreError> {
    let total_posts = count(pool).await?;
    let posts_last_hour = created_since(pool, now - Duration::hours(1)).await?;
    let posts_last_24h = created_since(pool, now - Duration::hours(24)).await?;
    let unique_authors: i64 = sqlx::query_scalar(&SQL.unique_authors())
        .fetch_one(pool)
        .await
        .map_err(|e| classify(e, "unique authors"))?;
    let categories: Vec<(String, i64)> = sqlx::query_as(&SQL.category_counts())
        .fetch_all(pool)
        .await
        .map_err(|e| classify(e, "category counts"))?;

    Ok(PostStats {
        total_posts,
        posts_last_hour,
        posts_last_24h,
        unique_authors,
        categories: categories.into_iter().collect(),
    })
}

async fn created_since(pool: &SqlitePool, since: DateTime<Utc>) -> Result<i64, StoreError> {
    sqlx::query_scalar(&SQL.created_since())
        .bind(since.timestamp_millis())
        .fetch_one(pool)
        .await
        .map_err(|e| classify(e, "created since"))
}
