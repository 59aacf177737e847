use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use voxcrm_core::credential::TenantOAuthApp;

use super::{OAuthAppRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOAuthAppRepository {
    pool: DbPool,
}

impl SqlOAuthAppRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthAppRepository for SqlOAuthAppRepository {
    async fn find_by_instance(
        &self,
        instance_url: &str,
    ) -> Result<Option<TenantOAuthApp>, RepositoryError> {
        let row = sqlx::query(
            "SELECT instance_url, app_key, app_secret FROM tenant_oauth_app WHERE instance_url = ?",
        )
        .bind(instance_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| TenantOAuthApp {
            instance_url: row.get("instance_url"),
            app_key: row.get("app_key"),
            app_secret: row.get("app_secret"),
        }))
    }

    async fn upsert(&self, app: TenantOAuthApp) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tenant_oauth_app (instance_url, app_key, app_secret, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(instance_url) DO UPDATE SET
                app_key = excluded.app_key,
                app_secret = excluded.app_secret,
                updated_at = excluded.updated_at",
        )
        .bind(&app.instance_url)
        .bind(&app.app_key)
        .bind(&app.app_secret)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
