use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::config::AppConfig;

/// Connections older than this are closed and replaced on next acquire.
pub const POOL_RECYCLE: Duration = Duration::from_secs(300);
const MAX_CONNECTIONS: u32 = 10;

/// Build the process-wide pool. Every checkout is pinged before it is handed out.
pub async fn connect(config: &AppConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid DATABASE_URL `{}`", config.database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .max_lifetime(POOL_RECYCLE)
        .idle_timeout(POOL_RECYCLE)
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .context("failed to connect to database")?;

    info!(database_url = %config.database_url, "database pool ready");
    Ok(pool)
}

/// Create any missing tables. Safe to call on every startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run database migrations")
}


#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = testing::config_in(dir.path());
        let pool = connect(&config).await.unwrap();

        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'sessions', 'print_requests') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["print_requests", "sessions", "users"]);
    }
}
