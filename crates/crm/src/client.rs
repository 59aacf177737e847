//! Thin authenticated wrapper over the CRM REST API.
//!
//! Every call goes through the [`CrmTransport`] seam so the client, the
//! token refresher, and the router stay testable without a network. The
//! HTTP implementation lives in [`HttpTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use voxcrm_core::AssistError;

use crate::resolver::ResolvedAuth;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CrmRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CrmResponse {
    pub status: u16,
    pub body: String,
}

impl CrmResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait CrmTransport: Send + Sync {
    async fn execute(&self, request: CrmRequest) -> Result<CrmResponse, AssistError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrmTransport for HttpTransport {
    async fn execute(&self, request: CrmRequest) -> Result<CrmResponse, AssistError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(pairs) => builder.form(pairs),
        };

        let response = builder.send().await.map_err(|error| AssistError::CrmApi {
            status: 502,
            body: format!("transport failure: {error}"),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| AssistError::CrmApi {
            status,
            body: format!("could not read response body: {error}"),
        })?;

        Ok(CrmResponse { status, body })
    }
}

/// Rows returned by ad-hoc SOQL execution.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub total_size: i64,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Value>,
}

pub struct CrmClient {
    transport: Arc<dyn CrmTransport>,
    api_version: String,
}

impl CrmClient {
    pub fn new(transport: Arc<dyn CrmTransport>, api_version: impl Into<String>) -> Self {
        Self { transport, api_version: api_version.into() }
    }

    fn data_url(&self, auth: &ResolvedAuth, path: &str) -> String {
        let instance = auth.instance_url.trim_end_matches('/');
        format!("{instance}/services/data/{}{path}", self.api_version)
    }

    /// One authenticated call. HTTP 204 is a successful empty result; any
    /// non-2xx is surfaced with the response body text intact so upstream
    /// classification can pattern-match on it.
    pub async fn call(
        &self,
        auth: &ResolvedAuth,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AssistError> {
        let url = self.data_url(auth, path);
        debug!(method = method.as_str(), url = %url, "crm api call");

        let response = self
            .transport
            .execute(CrmRequest {
                method,
                url,
                bearer: Some(auth.access_token.clone()),
                body: body.map(RequestBody::Json).unwrap_or(RequestBody::Empty),
            })
            .await?;

        if !response.is_success() {
            return Err(AssistError::CrmApi { status: response.status, body: response.body });
        }
        if response.status == 204 || response.body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response.body).map_err(|error| AssistError::CrmApi {
            status: response.status,
            body: format!("unparseable response body: {error}"),
        })
    }

    pub async fn get_record(
        &self,
        auth: &ResolvedAuth,
        object_type: &str,
        record_id: &str,
    ) -> Result<Value, AssistError> {
        self.call(auth, HttpMethod::Get, &format!("/sobjects/{object_type}/{record_id}"), None)
            .await
    }

    pub async fn create_record(
        &self,
        auth: &ResolvedAuth,
        object_type: &str,
        fields: Value,
    ) -> Result<Value, AssistError> {
        self.call(auth, HttpMethod::Post, &format!("/sobjects/{object_type}"), Some(fields)).await
    }

    /// PATCH returns 204 on success, surfaced here as `Ok(())`.
    pub async fn update_record(
        &self,
        auth: &ResolvedAuth,
        object_type: &str,
        record_id: &str,
        fields: Value,
    ) -> Result<(), AssistError> {
        self.call(
            auth,
            HttpMethod::Patch,
            &format!("/sobjects/{object_type}/{record_id}"),
            Some(fields),
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_record(
        &self,
        auth: &ResolvedAuth,
        object_type: &str,
        record_id: &str,
    ) -> Result<(), AssistError> {
        self.call(auth, HttpMethod::Delete, &format!("/sobjects/{object_type}/{record_id}"), None)
            .await
            .map(|_| ())
    }

    pub async fn run_query(
        &self,
        auth: &ResolvedAuth,
        soql: &str,
    ) -> Result<QueryResult, AssistError> {
        let value =
            self.call(auth, HttpMethod::Get, &format!("/query/?q={}", encode_query(soql)), None)
                .await?;
        serde_json::from_value(value).map_err(|error| AssistError::CrmApi {
            status: 200,
            body: format!("unexpected query result shape: {error}"),
        })
    }

    pub async fn run_search(
        &self,
        auth: &ResolvedAuth,
        sosl: &str,
    ) -> Result<Vec<Value>, AssistError> {
        let value =
            self.call(auth, HttpMethod::Get, &format!("/search/?q={}", encode_query(sosl)), None)
                .await?;
        Ok(value
            .get("searchRecords")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// The authenticated CRM user's external id, from the identity endpoint
    /// under the same fixed API version segment.
    pub async fn identity(&self, auth: &ResolvedAuth) -> Result<String, AssistError> {
        let value = self.call(auth, HttpMethod::Get, "/chatter/users/me", None).await?;
        value
            .get("id")
            .and_then(Value::as_str)
            .map(|id| id.to_string())
            .ok_or_else(|| AssistError::CrmApi {
                status: 200,
                body: "identity endpoint returned no user id".to_string(),
            })
    }
}

/// Minimal percent-encoding for SOQL/SOSL query strings. `%` must be first
/// so already-replaced sequences are not re-encoded.
pub fn encode_query(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('#', "%23")
        .replace(' ', "%20")
        .replace('/', "%2F")
        .replace(':', "%3A")
}
