//! PostgREST-backed remote store.
//!
//! Every call goes to `{base_url}/rest/v1/{table}` with the project's `apikey`
//! header and a bearer token: the user's access token for [`Caller::User`],
//! the service-role key for [`Caller::Service`].
//!
//! ## Error Mapping
//!
//! | HTTP status | PostgREST / Postgres code | StoreError |
//! |-------------|---------------------------|------------|
//! | 401 | `PGRST301`, `PGRST302` | `Unauthorized` |
//! | 403 | `42501` (RLS violation) | `Forbidden` |
//! | 409 | `23505` (unique violation) | `Conflict` |
//! | other non-2xx | any | `Rejected` |
//! | connection failure | n/a | `Transport` |
//! | non-JSON body | n/a | `Decode` |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::query::{Filter, Select};
use super::r#trait::{Caller, RemoteStore, StoreError};

#[derive(Debug, Clone)]
pub struct PostgrestStore {
    http: Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PostgrestStore {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, anon_key)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_key: None,
        }
    }

    /// Enable [`Caller::Service`] calls.
    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder, caller: &Caller) -> Result<RequestBuilder, StoreError> {
        match caller {
            Caller::User { token, .. } => Ok(request
                .header("apikey", &self.anon_key)
                .bearer_auth(token.as_str())),
            Caller::Service => {
                let key = self.service_key.as_deref().ok_or(StoreError::Unauthorized)?;
                Ok(request.header("apikey", key).bearer_auth(key))
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let err = map_status(status, &body);
        tracing::error!(status, error = %err, "remote store request failed");
        Err(err)
    }

    async fn rows(response: Response) -> Result<Vec<JsonValue>, StoreError> {
        let body = response.text().await.map_err(|e| StoreError::Transport(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))? {
            JsonValue::Array(rows) => Ok(rows),
            JsonValue::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }

    async fn single(response: Response) -> Result<JsonValue, StoreError> {
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("empty representation".to_string()))
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
        .collect()
}

fn map_status(status: u16, body: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| body.to_string());
    match (status, parsed.code.as_deref()) {
        (401, _) => StoreError::Unauthorized,
        (_, Some("42501")) | (403, _) => StoreError::Forbidden(message),
        (_, Some("23505")) | (409, _) => StoreError::Conflict(message),
        _ => StoreError::Rejected { status, message },
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn select(&self, caller: &Caller, query: &Select) -> Result<Vec<JsonValue>, StoreError> {
        let mut params = vec![("select".to_string(), query.columns())];
        params.extend(filter_params(&query.filters));
        if let Some(order) = query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }
        let request = self.authorize(self.http.get(self.url(&query.table)).query(&params), caller)?;
        Self::rows(self.send(request).await?).await
    }

    async fn insert(&self, caller: &Caller, table: &str, row: JsonValue) -> Result<JsonValue, StoreError> {
        let request = self
            .http
            .post(self.url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let request = self.authorize(request, caller)?;
        Self::single(self.send(request).await?).await
    }

    async fn update(
        &self,
        caller: &Caller,
        table: &str,
        filters: &[Filter],
        patch: JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let request = self
            .http
            .patch(self.url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        let request = self.authorize(request, caller)?;
        Self::rows(self.send(request).await?).await
    }

    async fn delete(&self, caller: &Caller, table: &str, filters: &[Filter]) -> Result<usize, StoreError> {
        let request = self
            .http
            .delete(self.url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation");
        let request = self.authorize(request, caller)?;
        Ok(Self::rows(self.send(request).await?).await?.len())
    }

    async fn upsert(
        &self,
        caller: &Caller,
        table: &str,
        row: JsonValue,
        on_conflict: &str,
    ) -> Result<JsonValue, StoreError> {
        let request = self
            .http
            .post(self.url(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        let request = self.authorize(request, caller)?;
        Self::single(self.send(request).await?).await
    }
}
