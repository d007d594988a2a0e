//! GoTrue-compatible auth provider client (`{base_url}/auth/v1/...`).
//!
//! ## Error Mapping
//!
//! | Endpoint | HTTP status | AuthError |
//! |----------|-------------|-----------|
//! | `token?grant_type=password` | 400 `invalid_grant` | `InvalidCredentials` |
//! | `user` | 401, 403 | `SessionExpired` |
//! | any | other non-2xx | `Rejected` (provider message kept for the form) |
//! | any | connection failure | `Transport` |

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;

use crm_auth::{AccessToken, AuthError, AuthEvent, AuthProvider, AuthSession, Identity, SignUpRequest};
use crm_core::UserId;

const EVENT_CAPACITY: usize = 64;

pub struct GoTrueClient {
    http: Client,
    base_url: String,
    anon_key: String,
    current: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserBody> for Identity {
    fn from(user: UserBody) -> Self {
        Identity {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserBody,
}

impl SessionBody {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(now + Duration::seconds(secs)),
            (None, None) => None,
        };
        AuthSession {
            access_token: AccessToken::new(self.access_token),
            refresh_token: self.refresh_token,
            identity: self.user.into(),
            expires_at,
        }
    }
}

/// `signup` answers with a session when confirmation is off, a bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(SessionBody),
    Pending(UserBody),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GoTrueClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, anon_key)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            current: RwLock::new(None),
            events,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, endpoint: &str) -> Result<T, AuthError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| AuthError::Transport(e.to_string()))?;
        if !(200..300).contains(&status) {
            let err = map_status(endpoint, status, &body);
            tracing::warn!(endpoint, status, error = %err, "auth provider request failed");
            return Err(err);
        }
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| AuthError::Transport(format!("unexpected response: {e}")))
    }

    fn publish(&self, session: Option<AuthSession>, event: AuthEvent) {
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn map_status(endpoint: &str, status: u16, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if endpoint == "token" && (status == 400 && parsed.error.as_deref() == Some("invalid_grant")) {
        return AuthError::InvalidCredentials;
    }
    if endpoint == "user" && matches!(status, 401 | 403) {
        return AuthError::SessionExpired;
    }
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| body.to_string());
    AuthError::Rejected { status, message }
}

#[async_trait]
impl AuthProvider for GoTrueClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let request = self
            .http
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let body: SessionBody = self.call(request, "token").await?;
        let session = body.into_session(Utc::now());
        self.publish(Some(session.clone()), AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<AuthSession>, AuthError> {
        let mut call = self.http.post(self.url("signup")).json(&json!({
            "email": request.email,
            "password": request.password,
            "data": { "nom": request.nom, "prenom": request.prenom },
        }));
        if let Some(redirect_to) = &request.redirect_to {
            call = call.query(&[("redirect_to", redirect_to)]);
        }
        match self.call::<SignUpBody>(call, "signup").await? {
            SignUpBody::Session(body) => {
                let session = body.into_session(Utc::now());
                self.publish(Some(session.clone()), AuthEvent::SignedIn(session.clone()));
                Ok(Some(session))
            }
            SignUpBody::Pending(user) => {
                tracing::info!(user_id = %user.id, "sign-up awaiting email confirmation");
                Ok(None)
            }
        }
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), AuthError> {
        let request = self.http.post(self.url("logout")).bearer_auth(token.as_str());
        self.call::<serde_json::Value>(request, "logout").await?;
        self.publish(None, AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let mut request = self.http.post(self.url("recover")).json(&json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        self.call::<serde_json::Value>(request, "recover").await?;
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.current.read().ok().and_then(|s| s.clone()))
    }

    async fn user_for_token(&self, token: &AccessToken) -> Result<Identity, AuthError> {
        let request = self.http.get(self.url("user")).bearer_auth(token.as_str());
        let user: UserBody = self.call(request, "user").await?;
        Ok(user.into())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
