//! SQLite pool construction for the credential store.
//!
//! The store holds one small row per caller, so pools stay tiny; the
//! interesting part is the per-connection pragmas. WAL keeps the CLI
//! commands and the assistant runtime from blocking each other, and the
//! busy timeout is derived from the configured acquire timeout so a
//! locked database surfaces as one consistent deadline.

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use voxcrm_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = timeout_secs.max(1).saturating_mul(1000).min(30_000);
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use voxcrm_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn connect_reads_settings_from_database_config() {
        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 5,
        };
        let pool = connect(&database).await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA busy_timeout").fetch_one(&pool).await.unwrap();
        assert_eq!(row.0, 5000);
        pool.close().await;
    }
}
