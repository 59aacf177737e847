use async_trait::async_trait;
use thiserror::Error;

use voxcrm_core::credential::{TenantCredential, TenantOAuthApp};

pub mod credential;
pub mod memory;
pub mod oauth_app;

pub use credential::SqlCredentialRepository;
pub use memory::{InMemoryCredentialRepository, InMemoryOAuthAppRepository};
pub use oauth_app::SqlOAuthAppRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Store of per-caller CRM credentials. `upsert` is last-write-wins; there
/// is exactly one live row per caller.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find_by_caller(
        &self,
        caller_id: &str,
    ) -> Result<Option<TenantCredential>, RepositoryError>;
    async fn upsert(&self, credential: TenantCredential) -> Result<(), RepositoryError>;
    async fn delete(&self, caller_id: &str) -> Result<(), RepositoryError>;
    /// The single pre-multi-tenant shared credential, if one exists.
    async fn find_legacy_shared(&self) -> Result<Option<TenantCredential>, RepositoryError>;
}

/// Store of per-instance OAuth app credentials, keyed by instance URL as
/// given. Callers decide which URL forms to try (see
/// `voxcrm_core::instance::lookup_forms`).
#[async_trait]
pub trait OAuthAppRepository: Send + Sync {
    async fn find_by_instance(
        &self,
        instance_url: &str,
    ) -> Result<Option<TenantOAuthApp>, RepositoryError>;
    async fn upsert(&self, app: TenantOAuthApp) -> Result<(), RepositoryError>;
}
