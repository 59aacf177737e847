//! OAuth token exchange against the tenant's own token endpoint.
//!
//! Refresh failures are classified by provider error text: a dead grant
//! (expired, invalid_grant, app removed) is unrecoverable and the caller
//! must delete the stored credential; everything else is transient and safe
//! to retry on the next request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use voxcrm_core::instance::lookup_forms;
use voxcrm_core::AssistError;
use voxcrm_db::repositories::OAuthAppRepository;

use crate::client::{CrmRequest, CrmResponse, CrmTransport, HttpMethod, RequestBody};

/// OAuth app (consumer) credentials used for a token grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthApp {
    pub key: String,
    pub secret: String,
}

/// Result of a successful grant. `refresh_token` is only present when the
/// provider rotated it; the stored one must be kept otherwise.
#[derive(Clone, Debug, Deserialize)]
pub struct FreshToken {
    pub access_token: String,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds; most providers omit it from the grant
    /// response and the resolver falls back to a conservative default.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn refresh(
        &self,
        refresh_token: &str,
        instance_url: &str,
        app: &OAuthApp,
    ) -> Result<FreshToken, AssistError>;

    async fn password_grant(
        &self,
        username: &str,
        password: &str,
        app: &OAuthApp,
        login_url: &str,
    ) -> Result<FreshToken, AssistError>;
}

pub struct HttpTokenRefresher {
    transport: Arc<dyn CrmTransport>,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn CrmTransport>) -> Self {
        Self { transport }
    }

    async fn post_grant(
        &self,
        base_url: &str,
        form: Vec<(String, String)>,
    ) -> Result<FreshToken, AssistError> {
        let url = format!("{}/services/oauth2/token", base_url.trim_end_matches('/'));
        debug!(url = %url, "oauth token grant");

        let response = self
            .transport
            .execute(CrmRequest {
                method: HttpMethod::Post,
                url,
                bearer: None,
                body: RequestBody::Form(form),
            })
            .await
            .map_err(|error| AssistError::RefreshTransient { reason: error.to_string() })?;

        classify_grant_response(response)
    }
}

fn classify_grant_response(response: CrmResponse) -> Result<FreshToken, AssistError> {
    if !response.is_success() {
        let error = AssistError::classify_refresh(response.body);
        warn!(status = response.status, unrecoverable = error.is_unrecoverable(), "token grant failed");
        return Err(error);
    }

    let token: FreshToken = serde_json::from_str(&response.body).map_err(|error| {
        AssistError::RefreshTransient { reason: format!("unparseable token response: {error}") }
    })?;
    if token.access_token.is_empty() {
        return Err(AssistError::RefreshTransient {
            reason: "token endpoint returned an empty access token".to_string(),
        });
    }
    Ok(token)
}

#[async_trait]
impl TokenExchange for HttpTokenRefresher {
    /// Standard refresh-token grant posted to the tenant's own token
    /// endpoint, derived from `instance_url` (multi-tenant instances each
    /// own their token endpoint).
    async fn refresh(
        &self,
        refresh_token: &str,
        instance_url: &str,
        app: &OAuthApp,
    ) -> Result<FreshToken, AssistError> {
        self.post_grant(
            instance_url,
            vec![
                ("grant_type".to_string(), "refresh_token".to_string()),
                ("refresh_token".to_string(), refresh_token.to_string()),
                ("client_id".to_string(), app.key.clone()),
                ("client_secret".to_string(), app.secret.clone()),
            ],
        )
        .await
    }

    async fn password_grant(
        &self,
        username: &str,
        password: &str,
        app: &OAuthApp,
        login_url: &str,
    ) -> Result<FreshToken, AssistError> {
        self.post_grant(
            login_url,
            vec![
                ("grant_type".to_string(), "password".to_string()),
                ("username".to_string(), username.to_string()),
                ("password".to_string(), password.to_string()),
                ("client_id".to_string(), app.key.clone()),
                ("client_secret".to_string(), app.secret.clone()),
            ],
        )
        .await
    }
}

/// Pick OAuth app credentials for one tenant: the per-instance app looked
/// up under both instance-URL forms (normalized first), else the global
/// default app. No app at all is an unrecoverable condition — a refresh
/// without credentials can never succeed.
pub async fn select_app(
    apps: &dyn OAuthAppRepository,
    instance_url: &str,
    default_app: Option<(String, String)>,
) -> Result<OAuthApp, AssistError> {
    for form in lookup_forms(instance_url) {
        let found = apps
            .find_by_instance(&form)
            .await
            .map_err(|error| AssistError::Store(error.to_string()))?;
        if let Some(app) = found {
            return Ok(OAuthApp { key: app.app_key, secret: app.app_secret });
        }
    }

    if let Some((key, secret)) = default_app {
        return Ok(OAuthApp { key, secret });
    }

    Err(AssistError::RefreshUnrecoverable {
        reason: "no OAuth credentials available for this instance".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use voxcrm_core::credential::TenantOAuthApp;
    use voxcrm_core::AssistError;
    use voxcrm_db::repositories::{InMemoryOAuthAppRepository, OAuthAppRepository};

    use super::{classify_grant_response, select_app};
    use crate::client::CrmResponse;

    #[test]
    fn http_400_with_invalid_grant_is_unrecoverable() {
        let error = classify_grant_response(CrmResponse {
            status: 400,
            body: r#"{"error":"invalid_grant","error_description":"expired access/refresh token"}"#
                .to_string(),
        })
        .expect_err("grant failure");
        assert!(error.is_unrecoverable());
    }

    #[test]
    fn http_503_is_transient() {
        let error = classify_grant_response(CrmResponse {
            status: 503,
            body: "upstream connect error".to_string(),
        })
        .expect_err("grant failure");
        assert!(matches!(error, AssistError::RefreshTransient { .. }));
    }

    #[test]
    fn successful_grant_may_omit_rotated_refresh_token() {
        let token = classify_grant_response(CrmResponse {
            status: 200,
            body: r#"{"access_token":"00Dnew","instance_url":"https://acme.my.salesforce.com"}"#
                .to_string(),
        })
        .expect("grant should parse");
        assert_eq!(token.access_token, "00Dnew");
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn per_tenant_app_wins_over_default() {
        let apps = InMemoryOAuthAppRepository::default();
        apps.upsert(TenantOAuthApp {
            instance_url: "https://acme.my.salesforce.com".to_string(),
            app_key: "tenant-key".to_string(),
            app_secret: "tenant-secret".to_string(),
        })
        .await
        .expect("upsert");

        let app = select_app(
            &apps,
            "https://acme.my.salesforce.com",
            Some(("default-key".to_string(), "default-secret".to_string())),
        )
        .await
        .expect("app should resolve");
        assert_eq!(app.key, "tenant-key");
    }

    #[tokio::test]
    async fn app_stored_under_login_domain_is_found_via_original_form() {
        let apps = InMemoryOAuthAppRepository::default();
        apps.upsert(TenantOAuthApp {
            instance_url: "https://acme.lightning.force.com".to_string(),
            app_key: "legacy-key".to_string(),
            app_secret: "legacy-secret".to_string(),
        })
        .await
        .expect("upsert");

        // Normalized form misses; the original login-domain spelling hits.
        let app = select_app(&apps, "https://acme.lightning.force.com", None)
            .await
            .expect("app should resolve");
        assert_eq!(app.key, "legacy-key");
    }

    #[tokio::test]
    async fn missing_app_everywhere_is_unrecoverable() {
        let apps = InMemoryOAuthAppRepository::default();
        let error = select_app(&apps, "https://acme.my.salesforce.com", None)
            .await
            .expect_err("no app anywhere");
        assert!(error.is_unrecoverable());
        assert!(error.to_string().contains("no OAuth credentials available"));
    }
}
