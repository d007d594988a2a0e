//! In-process auth provider for dev and tests.
//!
//! Issues HS256 access tokens signed with the configured secret, so the web
//! layer verifies them exactly like provider-issued ones. Sign-up writes the
//! `profiles` row the hosted backend would create, and optionally provisions
//! an organization with the new user as `owner`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::broadcast;

use crm_auth::{
    AccessToken, AuthError, AuthEvent, AuthProvider, AuthSession, Hs256SessionValidator, Hs256TokenIssuer, Identity,
    SessionClaims, SessionValidator, SignUpRequest,
};
use crm_core::{OrganizationId, RecordId, UserId};

use crate::store::InMemoryStore;

const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    password: String,
}

pub struct InMemoryAuthProvider {
    store: Arc<InMemoryStore>,
    issuer: Hs256TokenIssuer,
    validator: Hs256SessionValidator,
    accounts: RwLock<HashMap<String, Account>>,
    provision_organizations: bool,
    current: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl InMemoryAuthProvider {
    pub fn new(store: Arc<InMemoryStore>, jwt_secret: &str) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            issuer: Hs256TokenIssuer::new(jwt_secret),
            validator: Hs256SessionValidator::new(jwt_secret),
            accounts: RwLock::new(HashMap::new()),
            provision_organizations: true,
            current: RwLock::new(None),
            events,
        }
    }

    /// When off, new users have no organization until one is seeded for them
    /// (the "being provisioned" state).
    pub fn provision_organizations(mut self, enabled: bool) -> Self {
        self.provision_organizations = enabled;
        self
    }

    /// Mint a session for `user` without going through the password check.
    pub fn issue(&self, user: UserId, email: Option<&str>) -> Result<AuthSession, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user,
            email: email.map(str::to_string),
            role: Some("authenticated".to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
        };
        let token = self
            .issuer
            .issue(&claims)
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(AuthSession {
            access_token: AccessToken::new(token),
            refresh_token: None,
            identity: claims.identity(),
            expires_at: claims.expires_at(),
        })
    }

    fn publish(&self, session: Option<AuthSession>, event: AuthEvent) {
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
        let _ = self.events.send(event);
    }

    fn provision(&self, user: UserId, request: &SignUpRequest) -> Result<(), AuthError> {
        let seed = |table: &str, row| {
            self.store
                .seed(table, row)
                .map_err(|e| AuthError::Profile(e.to_string()))
        };
        let now = Utc::now().to_rfc3339();
        seed(
            "profiles",
            json!({
                "id": user,
                "email": request.email,
                "nom": request.nom,
                "prenom": request.prenom,
                "role": "user",
                "onboarding_completed": false,
                "created_at": now,
            }),
        )?;
        if !self.provision_organizations {
            return Ok(());
        }

        let organization = OrganizationId::new();
        let label = match request.prenom.trim() {
            "" => request.email.clone(),
            prenom => prenom.to_string(),
        };
        seed(
            "organizations",
            json!({
                "id": organization,
                "name": format!("Organisation de {label}"),
                "slug": format!("org-{}", &organization.to_string()[..8]),
                "created_at": now,
            }),
        )?;
        seed(
            "organization_members",
            json!({
                "id": RecordId::new(),
                "organization_id": organization,
                "user_id": user,
                "role": "owner",
                "joined_at": now,
            }),
        )?;
        tracing::info!(user_id = %user, organization_id = %organization, "organization provisioned");
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let account = self
            .accounts
            .read()
            .ok()
            .and_then(|accounts| accounts.get(&email.trim().to_lowercase()).cloned())
            .filter(|account| account.password == password)
            .ok_or(AuthError::InvalidCredentials)?;
        let session = self.issue(account.id, Some(email))?;
        self.publish(Some(session.clone()), AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<AuthSession>, AuthError> {
        let key = request.email.trim().to_lowercase();
        if !key.contains('@') {
            return Err(AuthError::Rejected {
                status: 422,
                message: "Adresse email invalide.".to_string(),
            });
        }
        if request.password.len() < 6 {
            return Err(AuthError::Rejected {
                status: 422,
                message: "Password should be at least 6 characters".to_string(),
            });
        }

        let user = UserId::new();
        {
            let mut accounts = self
                .accounts
                .write()
                .map_err(|_| AuthError::Transport("account table poisoned".to_string()))?;
            if accounts.contains_key(&key) {
                return Err(AuthError::Rejected {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }
            accounts.insert(
                key,
                Account {
                    id: user,
                    password: request.password.clone(),
                },
            );
        }
        self.provision(user, request)?;

        let session = self.issue(user, Some(&request.email))?;
        self.publish(Some(session.clone()), AuthEvent::SignedIn(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self, _token: &AccessToken) -> Result<(), AuthError> {
        self.publish(None, AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str, _redirect_to: Option<&str>) -> Result<(), AuthError> {
        tracing::info!(email, "password reset requested");
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.current.read().ok().and_then(|s| s.clone()))
    }

    async fn user_for_token(&self, token: &AccessToken) -> Result<Identity, AuthError> {
        self.validator
            .validate(token.as_str(), Utc::now())
            .map(|claims| claims.identity())
            .map_err(|_| AuthError::SessionExpired)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
