use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use voxcrm_core::credential::{TenantCredential, LEGACY_SHARED_CALLER};

use super::{CredentialRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCredentialRepository {
    pool: DbPool,
}

impl SqlCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_credential(row: &sqlx::sqlite::SqliteRow) -> Result<TenantCredential, RepositoryError> {
    let expires_at_raw: String = row.try_get("expires_at").map_err(RepositoryError::Database)?;
    let expires_at = expires_at_raw
        .parse::<DateTime<Utc>>()
        .map_err(|error| RepositoryError::Decode(format!("invalid expires_at: {error}")))?;

    Ok(TenantCredential {
        caller_id: row.try_get("caller_id").map_err(RepositoryError::Database)?,
        access_token: row.try_get("access_token").map_err(RepositoryError::Database)?,
        refresh_token: row.try_get("refresh_token").map_err(RepositoryError::Database)?,
        instance_url: row.try_get("instance_url").map_err(RepositoryError::Database)?,
        expires_at,
        external_user_id: row.try_get("external_user_id").ok(),
    })
}

#[async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn find_by_caller(
        &self,
        caller_id: &str,
    ) -> Result<Option<TenantCredential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT caller_id, access_token, refresh_token, instance_url, expires_at, external_user_id
             FROM tenant_credential WHERE caller_id = ?",
        )
        .bind(caller_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_credential).transpose()
    }

    async fn upsert(&self, credential: TenantCredential) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tenant_credential (
                caller_id, access_token, refresh_token, instance_url,
                expires_at, external_user_id, updated_at
             )
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(caller_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                instance_url = excluded.instance_url,
                expires_at = excluded.expires_at,
                external_user_id = excluded.external_user_id,
                updated_at = excluded.updated_at",
        )
        .bind(&credential.caller_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(&credential.instance_url)
        .bind(credential.expires_at.to_rfc3339())
        .bind(credential.external_user_id.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, caller_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM tenant_credential WHERE caller_id = ?")
            .bind(caller_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_legacy_shared(&self) -> Result<Option<TenantCredential>, RepositoryError> {
        self.find_by_caller(LEGACY_SHARED_CALLER).await
    }
}
