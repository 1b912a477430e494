//! Helpers to create/configure the SQLite pool and backfill missing columns.
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;

use crate::ports::store::StoreError;

pub async fn create_pool(db_path: &Path) -> Result<SqlitePool, StoreError> {
    let full_path = if db_path.is_absolute() {
        db_path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(db_path)
    };

    if let Some(parent) = full_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::Connection(format!("db dir create error: {e}")))?;
    }

    let url = format!("sqlite://{}", full_path.display());
    let opts = SqliteConnectOptions::from_str(&url)
        .map_err(|e| StoreError::Connection(format!("db connect options error: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .map_err(|e| StoreError::Connection(format!("db connect error: {e}")))
}

/// Adds `column` to `posts` unless `pragma_table_info` already lists it.
pub async fn ensure_posts_column(
    pool: &SqlitePool,
    column: &str,
    ddl: &str,
) -> Result<bool, sqlx::Error> {
    let has_column: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM pragma_table_info('posts') WHERE name = ?1 LIMIT 1")
            .bind(column)
            .fetch_optional(pool)
            .await?;

    if has_column.is_some() {
        return Ok(false);
    }

    match sqlx::query(ddl).execute(pool).await {
        Ok(_) => {
            info!(column, "Added column to posts");
            Ok(true)
        }
        Err(e) if is_duplicate_column(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_duplicate_column(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.message().contains("duplicate column"))
}
