//! Credential resolution for outbound CRM calls.
//!
//! Every CRM operation starts here: given a caller id, produce a usable
//! access token and instance URL. Sources are tried in a fixed order
//! (static pair, service-account password grant, per-caller stored
//! credential, legacy shared credential) and a stored credential is
//! refreshed in place when it is within the configured buffer of expiry.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

use voxcrm_core::config::CrmConfig;
use voxcrm_core::credential::TenantCredential;
use voxcrm_core::instance::normalize_instance_url;
use voxcrm_core::AssistError;
use voxcrm_db::repositories::{CredentialRepository, OAuthAppRepository};

use crate::oauth::{select_app, FreshToken, TokenExchange};

/// Fallback token lifetime when the grant response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7200;

/// What a CRM call actually needs: a bearer token and the instance it is
/// valid against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAuth {
    pub access_token: String,
    pub instance_url: String,
}

pub struct CredentialResolver {
    crm: CrmConfig,
    credentials: Arc<dyn CredentialRepository>,
    apps: Arc<dyn OAuthAppRepository>,
    refresher: Arc<dyn TokenExchange>,
}

impl CredentialResolver {
    pub fn new(
        crm: CrmConfig,
        credentials: Arc<dyn CredentialRepository>,
        apps: Arc<dyn OAuthAppRepository>,
        refresher: Arc<dyn TokenExchange>,
    ) -> Self {
        Self { crm, credentials, apps, refresher }
    }

    /// Resolve auth for one caller. Static and service-account modes are
    /// global and ignore the caller id; stored credentials are per caller
    /// with the legacy shared row as a last resort.
    pub async fn resolve(&self, caller_id: &str) -> Result<ResolvedAuth, AssistError> {
        if let Some((access_token, instance_url)) = self.crm.static_pair() {
            debug!("using statically configured CRM credentials");
            return Ok(ResolvedAuth { access_token, instance_url });
        }

        if let Some((username, password)) = self.crm.service_account() {
            return self.password_grant(&username, &password).await;
        }

        let stored = self
            .credentials
            .find_by_caller(caller_id)
            .await
            .map_err(|error| AssistError::Store(error.to_string()))?;
        if let Some(credential) = stored {
            return self.freshen(credential).await;
        }

        let shared = self
            .credentials
            .find_legacy_shared()
            .await
            .map_err(|error| AssistError::Store(error.to_string()))?;
        if let Some(credential) = shared {
            debug!(caller_id, "falling back to legacy shared credential");
            return self.freshen(credential).await;
        }

        Err(AssistError::NotConnected)
    }

    /// Service-account mode grants a fresh token on every resolution; the
    /// result is deliberately never written to the credential store.
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ResolvedAuth, AssistError> {
        let app = select_app(self.apps.as_ref(), &self.crm.login_url, self.crm.default_app())
            .await?;
        let token = self
            .refresher
            .password_grant(username, password, &app, &self.crm.login_url)
            .await?;
        let instance_url = token.instance_url.clone().ok_or_else(|| {
            AssistError::RefreshTransient {
                reason: "password grant response omitted instance_url".to_string(),
            }
        })?;
        info!("authenticated via service-account password grant");
        Ok(ResolvedAuth { access_token: token.access_token, instance_url })
    }

    /// Return the stored credential as-is when it has useful life left,
    /// otherwise refresh it. The refreshed credential is persisted before
    /// it is handed back so a crash after the refresh cannot strand a
    /// rotated refresh token.
    async fn freshen(&self, credential: TenantCredential) -> Result<ResolvedAuth, AssistError> {
        if !credential.needs_refresh(Utc::now(), self.crm.refresh_buffer()) {
            return Ok(ResolvedAuth {
                access_token: credential.access_token,
                instance_url: credential.instance_url,
            });
        }

        debug!(caller_id = %credential.caller_id, "stored token near expiry, refreshing");
        match self.refresh_once(&credential).await {
            Ok(token) => {
                let updated = apply_fresh_token(credential, token);
                self.credentials
                    .upsert(updated.clone())
                    .await
                    .map_err(|error| AssistError::Store(error.to_string()))?;
                Ok(ResolvedAuth {
                    access_token: updated.access_token,
                    instance_url: updated.instance_url,
                })
            }
            Err(error) if error.is_unrecoverable() => {
                warn!(caller_id = %credential.caller_id, %error, "refresh grant is dead, dropping stored credential");
                self.credentials
                    .delete(&credential.caller_id)
                    .await
                    .map_err(|error| AssistError::Store(error.to_string()))?;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    async fn refresh_once(&self, credential: &TenantCredential) -> Result<FreshToken, AssistError> {
        let app = select_app(
            self.apps.as_ref(),
            &credential.instance_url,
            self.crm.default_app(),
        )
        .await?;
        self.refresher
            .refresh(&credential.refresh_token, &credential.instance_url, &app)
            .await
    }
}

/// Fold a grant response into the stored credential. The refresh token and
/// instance URL only change when the provider sends replacements.
fn apply_fresh_token(mut credential: TenantCredential, token: FreshToken) -> TenantCredential {
    credential.access_token = token.access_token;
    if let Some(refresh_token) = token.refresh_token {
        credential.refresh_token = refresh_token;
    }
    if let Some(instance_url) = token.instance_url {
        credential.instance_url = normalize_instance_url(&instance_url);
    }
    let lifetime = token
        .expires_in
        .and_then(|secs| i64::try_from(secs).ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    credential.expires_at = Utc::now() + ChronoDuration::seconds(lifetime);
    credential
}
