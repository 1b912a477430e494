//! Database migrations for Postgres: create the posts table/indexes, add newer columns.
use sqlx::PgPool;
use tracing::info;

use crate::domain::model::SqlDialect;
use crate::infra::sql::{chunk_statements, classify, PostSql, ADDITIVE_COLUMNS};
use crate::ports::store::StoreError;

const POSTGRES_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/res/sql/postgres/schema.sql"
));

pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    info!("DB migrate start (postgres)");

    for ddl in chunk_statements(POSTGRES_SCHEMA) {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| classify(e, "migrate error (ddl)"))?;
    }

    let sql = PostSql::new(SqlDialect::Postgres);
    for (name, sqlite_type, postgres_type) in ADDITIVE_COLUMNS {
        let ddl = sql.add_column(name, sqlite_type, postgres_type);
        match sqlx::query(&ddl).execute(pool).await {
            Ok(_) => {}
            // 42701: duplicate_column
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("42701") => {}
            Err(e) => return Err(classify(e, "migrate error (column)")),
        }
    }

    info!("DB migrate done");
    Ok(())
}
