use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved caller id for the single pre-multi-tenant shared credential.
pub const LEGACY_SHARED_CALLER: &str = "legacy-shared";

/// Per-caller credential record. Owned exclusively by the credential
/// resolver: mutated only through a successful token refresh, deleted when a
/// refresh is unrecoverable. Exactly one live record per caller
/// (last-write-wins upsert).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredential {
    pub caller_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub instance_url: String,
    pub expires_at: DateTime<Utc>,
    pub external_user_id: Option<String>,
}

impl TenantCredential {
    /// True when `expires_at` falls within `buffer` of `now`, i.e. the token
    /// must be refreshed before use.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: std::time::Duration) -> bool {
        let buffer = chrono::Duration::from_std(buffer).unwrap_or_else(|_| chrono::Duration::zero());
        self.expires_at <= now + buffer
    }
}

/// Per-CRM-instance OAuth app credentials, used instead of the global
/// default app when refreshing that tenant's tokens. Keyed by normalized
/// instance URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOAuthApp {
    pub instance_url: String,
    pub app_key: String,
    pub app_secret: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::TenantCredential;

    fn credential(expires_in_secs: i64) -> TenantCredential {
        TenantCredential {
            caller_id: "caller-1".to_string(),
            access_token: "00Dtoken".to_string(),
            refresh_token: "refresh".to_string(),
            instance_url: "https://acme.my.salesforce.com".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
            external_user_id: None,
        }
    }

    #[test]
    fn token_far_from_expiry_does_not_need_refresh() {
        assert!(!credential(3600).needs_refresh(Utc::now(), Duration::from_secs(300)));
    }

    #[test]
    fn token_inside_buffer_needs_refresh() {
        assert!(credential(120).needs_refresh(Utc::now(), Duration::from_secs(300)));
    }

    #[test]
    fn already_expired_token_needs_refresh() {
        assert!(credential(-60).needs_refresh(Utc::now(), Duration::from_secs(300)));
    }
}
