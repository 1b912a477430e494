//! Database wiring: creates the post store for the configured SQL dialect.
use std::sync::Arc;

use crate::domain::model::{AppConfig, SqlDialect};
use crate::infra::{postgres_repo::PostgresStore, sqlite_repo::SqliteStore};
use crate::ports::store::{PostStore, StoreError};

pub async fn create_store(cfg: &AppConfig) -> Result<Arc<dyn PostStore>, StoreError> {
    match cfg.db_dialect {
        SqlDialect::Sqlite => Ok(Arc::new(
            SqliteStore::new(&cfg.sqlite_path, &cfg.timezone).await?,
        )),
        SqlDialect::Postgres => Ok(Arc::new(
            PostgresStore::new(&cfg.postgres, &cfg.timezone).await?,
        )),
    }
}
