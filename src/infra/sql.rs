//! Query text and row mapping shared by the SQLite and Postgres stores.
//!
//! Both backends run the same statements; only the placeholder syntax and a
//! few DDL details differ, so the strings are built here per dialect.
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::domain::model::{ScoredPost, SqlDialect, StoredPost};
use crate::infra::time::epoch_ms_to_iso;
use crate::ports::store::{PostFilter, StoreError};

const POST_COLUMNS: &str = "id, post_id, author_handle, author_verified, category, text, \
     created_at_ms, created_at_text, likes, reposts, replies, permalink, is_repost, \
     relevance_score, ingested_at_ms, ingested_at_text, processed";

/// Columns added after the first schema revision, with their SQLite and Postgres types.
pub const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("author_verified", "INTEGER NOT NULL DEFAULT 0", "BOOLEAN NOT NULL DEFAULT FALSE"),
    ("relevance_score", "INTEGER NOT NULL DEFAULT 0", "BIGINT NOT NULL DEFAULT 0"),
    ("ingested_at_ms", "INTEGER NOT NULL DEFAULT 0", "BIGINT NOT NULL DEFAULT 0"),
    ("ingested_at_text", "TEXT NOT NULL DEFAULT ''", "TEXT NOT NULL DEFAULT ''"),
    ("processed", "INTEGER NOT NULL DEFAULT 0", "BOOLEAN NOT NULL DEFAULT FALSE"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSql {
    dialect: SqlDialect,
}

impl PostSql {
    pub const fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn placeholder(&self, n: usize) -> String {
        match self.dialect {
            SqlDialect::Sqlite => format!("?{n}"),
            SqlDialect::Postgres => format!("${n}"),
        }
    }

    pub fn add_column(&self, name: &str, sqlite_type: &str, postgres_type: &str) -> String {
        match self.dialect {
            SqlDialect::Sqlite => format!("ALTER TABLE posts ADD COLUMN {name} {sqlite_type}"),
            SqlDialect::Postgres => {
                format!("ALTER TABLE posts ADD COLUMN IF NOT EXISTS {name} {postgres_type}")
            }
        }
    }

    pub fn exists(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM posts WHERE post_id = {}",
            self.placeholder(1)
        )
    }

    pub fn upsert(&self) -> String {
        let values = (1..=15)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"
      INSERT INTO posts(
        post_id, author_handle, author_verified, category, text,
        created_at_ms, created_at_text, likes, reposts, replies,
        permalink, is_repost, relevance_score, ingested_at_ms, ingested_at_text,
        processed
      ) VALUES ({values}, FALSE)
      ON CONFLICT(post_id) DO UPDATE SET
        likes = excluded.likes,
        reposts = excluded.reposts,
        replies = excluded.replies,
        ingested_at_ms = excluded.ingested_at_ms,
        ingested_at_text = excluded.ingested_at_text,
        processed = FALSE
      "#
        )
    }

    pub fn count(&self) -> String {
        "SELECT COUNT(*) FROM posts".to_string()
    }

    pub fn top_by_engagement(&self) -> String {
        format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE is_repost = FALSE AND created_at_ms >= {} \
             ORDER BY (likes + reposts + replies) DESC, created_at_ms DESC LIMIT {}",
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    pub fn recent(&self) -> String {
        format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE is_repost = FALSE \
             ORDER BY created_at_ms DESC LIMIT {}",
            self.placeholder(1)
        )
    }

    pub fn by_category(&self) -> String {
        format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE category = {} AND is_repost = FALSE \
             ORDER BY created_at_ms DESC LIMIT {}",
            self.placeholder(1),
            self.placeholder(2)
        )
    }

    pub fn created_since(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM posts WHERE created_at_ms >= {}",
            self.placeholder(1)
        )
    }

    pub fn unique_authors(&self) -> String {
        "SELECT COUNT(DISTINCT author_handle) FROM posts".to_string()
    }

    pub fn category_counts(&self) -> String {
        "SELECT category, COUNT(*) FROM posts GROUP BY category ORDER BY category".to_string()
    }

    /// Filtered, paginated listing, newest first.
    pub fn list(&self, filter: &PostFilter, now: DateTime<Utc>) -> (String, Vec<SqlArg>) {
        let mut clauses = vec!["is_repost = FALSE".to_string()];
        let mut args = Vec::new();

        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            args.push(SqlArg::Text(category.to_string()));
            clauses.push(format!("category = {}", self.placeholder(args.len())));
        }
        if let Some(author) = filter.author.as_deref().filter(|a| !a.is_empty()) {
            args.push(SqlArg::Text(author.trim_start_matches('@').to_string()));
            clauses.push(format!("author_handle = {}", self.placeholder(args.len())));
        }
        if let Some(min) = filter.min_engagement {
            args.push(SqlArg::Int(min));
            clauses.push(format!(
                "(likes + reposts + replies) >= {}",
                self.placeholder(args.len())
            ));
        }
        if let Some(hours) = filter.hours.filter(|h| *h > 0) {
            let since = now.timestamp_millis() - hours.saturating_mul(3_600_000);
            args.push(SqlArg::Int(since));
            clauses.push(format!("created_at_ms >= {}", self.placeholder(args.len())));
        }

        args.push(SqlArg::Int(filter.page_size()));
        let limit = self.placeholder(args.len());
        args.push(SqlArg::Int(filter.page_offset()));
        let offset = self.placeholder(args.len());

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE {} ORDER BY created_at_ms DESC LIMIT {limit} OFFSET {offset}",
            clauses.join(" AND ")
        );
        (sql, args)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PostRecord {
    pub id: i64,
    pub post_id: String,
    pub author_handle: String,
    pub author_verified: bool,
    pub category: String,
    pub text: String,
    pub created_at_ms: i64,
    pub created_at_text: String,
    pub likes: i64,
    pub reposts: i64,
    pub replies: i64,
    pub permalink: String,
    pub is_repost: bool,
    pub relevance_score: i64,
    pub ingested_at_ms: i64,
    pub ingested_at_text: String,
    pub processed: bool,
}

impl From<PostRecord> for StoredPost {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.id,
            post_id: value.post_id,
            author_handle: value.author_handle,
            author_verified: value.author_verified,
            category: value.category,
            text: value.text,
            created_at_ms: value.created_at_ms,
            created_at_text: value.created_at_text,
            likes: value.likes,
            reposts: value.reposts,
            replies: value.replies,
            permalink: value.permalink,
            is_repost: value.is_repost,
            relevance_score: value.relevance_score,
            ingested_at_ms: value.ingested_at_ms,
            ingested_at_text: value.ingested_at_text,
            processed: value.processed,
        }
    }
}

/// Bind-ready values for one upsert, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertRow {
    pub post_id: String,
    pub author_handle: String,
    pub author_verified: bool,
    pub category: String,
    pub text: String,
    pub created_at_ms: i64,
    pub created_at_text: String,
    pub likes: i64,
    pub reposts: i64,
    pub replies: i64,
    pub permalink: String,
    pub is_repost: bool,
    pub relevance_score: i64,
    pub ingested_at_ms: i64,
    pub ingested_at_text: String,
}

impl UpsertRow {
    pub fn prepare(
        post: &ScoredPost,
        ingested_at: DateTime<Utc>,
        zone: &Tz,
    ) -> Result<Self, StoreError> {
        let draft = &post.draft;
        check_required("post_id", &draft.post_id)?;
        check_required("author_handle", &draft.author_handle)?;
        check_required("text", &draft.text)?;

        let created_at_ms = draft.created_at.timestamp_millis();
        let ingested_at_ms = ingested_at.timestamp_millis();
        Ok(Self {
            post_id: draft.post_id.clone(),
            author_handle: draft.author_handle.clone(),
            author_verified: draft.author_verified,
            category: draft.category.as_str().to_string(),
            text: draft.text.clone(),
            created_at_ms,
            created_at_text: epoch_ms_to_iso(created_at_ms, zone),
            likes: to_i64(draft.likes),
            reposts: to_i64(draft.reposts),
            replies: to_i64(draft.replies),
            permalink: draft.permalink.clone(),
            is_repost: draft.is_repost(),
            relevance_score: i64::from(post.relevance_score),
            ingested_at_ms,
            ingested_at_text: epoch_ms_to_iso(ingested_at_ms, zone),
        })
    }
}

fn check_required(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Malformed(format!("missing {field}")));
    }
    Ok(())
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Splits driver errors into "backend unusable" and "this statement failed".
pub fn classify(err: sqlx::Error, context: &str) -> StoreError {
    let connection_class = matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_)
            | sqlx::Error::WorkerCrashed
    );
    if connection_class {
        StoreError::Connection(format!("{context}: {err}"))
    } else {
        StoreError::Query(format!("{context}: {err}"))
    }
}

/// Lower bound for `top_by_engagement`; no window means every post.
pub fn since_ms(since: Option<DateTime<Utc>>) -> i64 {
    since.map_or(i64::MIN, |t| t.timestamp_millis())
}

pub fn chunk_statements(schema: &str) -> impl Iterator<Item = &str> {
    schema.split(';').map(str::trim).filter(|s| !s.is_empty())
}
