//! Helpers to create/configure the Postgres pool.
use std::str::FromStr;

use chrono_tz::Tz;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tracing::info;

use crate::domain::model::PostgresConfig;
use crate::ports::store::StoreError;

pub async fn create_pool(cfg: &PostgresConfig, timezone: &Tz) -> Result<PgPool, StoreError> {
    let opts = connect_options(cfg)?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(set_time_zone(timezone))
        .connect_with(opts.clone())
        .await;

    match pool {
        Ok(p) => Ok(p),
        Err(first) if cfg.url.is_none() => {
            info!(error = %first, database = %cfg.database, "Postgres connect failed, ensuring database exists");
            ensure_database_exists(cfg).await?;
            PgPoolOptions::new()
                .max_connections(10)
                .after_connect(set_time_zone(timezone))
                .connect_with(opts)
                .await
                .map_err(|e| StoreError::Connection(format!("postgres connect error after create: {e}")))
        }
        Err(e) => Err(StoreError::Connection(format!("postgres connect error: {e}"))),
    }
}

fn set_time_zone(
    timezone: &Tz,
) -> impl Fn(
    &mut sqlx::PgConnection,
    sqlx::pool::PoolConnectionMetadata,
)
    -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), sqlx::Error>> + Send + '_>> {
    let tz_name = timezone.name().to_string();
    move |conn, _meta| {
        let tz = tz_name.clone();
        Box::pin(async move {
            // SET TIME ZONE takes no bind params.
            let stmt = format!("SET TIME ZONE '{}'", tz.replace('\'', "''"));
            sqlx::query(&stmt).execute(conn).await?;
            Ok(())
        })
    }
}

fn connect_options(cfg: &PostgresConfig) -> Result<PgConnectOptions, StoreError> {
    match cfg.url.as_deref() {
        Some(url) => PgConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(format!("postgres url error: {e}"))),
        None => Ok(parts_options(cfg, &cfg.database)),
    }
}

fn parts_options(cfg: &PostgresConfig, database: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(database)
}

async fn ensure_database_exists(cfg: &PostgresConfig) -> Result<(), StoreError> {
    validate_db_name(&cfg.database)?;
    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(parts_options(cfg, "postgres"))
        .await
        .map_err(|e| StoreError::Connection(format!("postgres connect error (admin db): {e}")))?;

    let create_sql = format!("CREATE DATABASE \"{}\";", &cfg.database);
    let res = sqlx::query(&create_sql).execute(&admin_pool).await;
    admin_pool.close().await;
    match res {
        Ok(_) => {
            info!(database = %cfg.database, "Created postgres database");
            Ok(())
        }
        Err(e) if is_duplicate_db_error(&e) => Ok(()),
        Err(e) => Err(StoreError::Connection(format!("postgres create database error: {e}"))),
    }
}

fn validate_db_name(name: &str) -> Result<(), StoreError> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(StoreError::Connection(format!(
            "invalid postgres database name '{name}': only alphanumeric, '_' and '-' allowed"
        )))
    }
}

fn is_duplicate_db_error(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("42P04"))
}
