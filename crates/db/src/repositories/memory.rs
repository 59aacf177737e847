use std::collections::HashMap;

use tokio::sync::RwLock;

use voxcrm_core::credential::{TenantCredential, TenantOAuthApp, LEGACY_SHARED_CALLER};

use super::{CredentialRepository, OAuthAppRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: RwLock<HashMap<String, TenantCredential>>,
}

#[async_trait::async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find_by_caller(
        &self,
        caller_id: &str,
    ) -> Result<Option<TenantCredential>, RepositoryError> {
        let credentials = self.credentials.read().await;
        Ok(credentials.get(caller_id).cloned())
    }

    async fn upsert(&self, credential: TenantCredential) -> Result<(), RepositoryError> {
        let mut credentials = self.credentials.write().await;
        credentials.insert(credential.caller_id.clone(), credential);
        Ok(())
    }

    async fn delete(&self, caller_id: &str) -> Result<(), RepositoryError> {
        let mut credentials = self.credentials.write().await;
        credentials.remove(caller_id);
        Ok(())
    }

    async fn find_legacy_shared(&self) -> Result<Option<TenantCredential>, RepositoryError> {
        self.find_by_caller(LEGACY_SHARED_CALLER).await
    }
}

#[derive(Default)]
pub struct InMemoryOAuthAppRepository {
    apps: RwLock<HashMap<String, TenantOAuthApp>>,
}

#[async_trait::async_trait]
impl OAuthAppRepository for InMemoryOAuthAppRepository {
    async fn find_by_instance(
        &self,
        instance_url: &str,
    ) -> Result<Option<TenantOAuthApp>, RepositoryError> {
        let apps = self.apps.read().await;
        Ok(apps.get(instance_url).cloned())
    }

    async fn upsert(&self, app: TenantOAuthApp) -> Result<(), RepositoryError> {
        let mut apps = self.apps.write().await;
        apps.insert(app.instance_url.clone(), app);
        Ok(())
    }
}
