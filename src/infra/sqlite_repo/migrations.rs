//! Database migrations: create the posts table/indexes and ensure newer columns exist.
use sqlx::SqlitePool;
use tracing::info;

use super::connection::ensure_posts_column;
use crate::domain::model::SqlDialect;
use crate::infra::sql::{chunk_statements, classify, PostSql, ADDITIVE_COLUMNS};
use crate::ports::store::StoreError;

const SQLITE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/res/sql/sqlite/schema.sql"
));

pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    info!("DB migrate start (sqlite)");

    for ddl in chunk_statements(SQLITE_SCHEMA) {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| classify(e, "migrate error (ddl)"))?;
    }

    let sql = PostSql::new(SqlDialect::Sqlite);
    for (name, sqlite_type, postgres_type) in ADDITIVE_COLUMNS {
        let ddl = sql.add_column(name, sqlite_type, postgres_type);
        ensure_posts_column(pool, name, &ddl)
            .await
            .map_err(|e| classify(e, "migrate error (column)"))?;
    }

    info!("DB migrate done");
    Ok(())
}
