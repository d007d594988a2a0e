//! Port to the external auth provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{AccessToken, Identity};

/// A signed-in session as handed out by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
    pub identity: Identity,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Auth-state transitions published by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    UserUpdated(AuthSession),
    SignedOut,
}

impl AuthEvent {
    /// Session carried by the event, `None` for sign-out.
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) | AuthEvent::UserUpdated(s) => Some(s),
            AuthEvent::SignedOut => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub nom: String,
    pub prenom: String,
    /// Where the confirmation email should send the user back to.
    pub redirect_to: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("session expired")]
    SessionExpired,

    #[error("not signed in")]
    NotSignedIn,

    /// The provider rejected the request with a message meant for the user.
    #[error("auth provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth provider unreachable: {0}")]
    Transport(String),

    #[error("profile lookup failed: {0}")]
    Profile(String),
}

impl AuthError {
    /// Message displayed inline in the auth forms.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Identifiants de connexion invalides.".to_string(),
            AuthError::SessionExpired => "Votre session a expiré, veuillez vous reconnecter.".to_string(),
            AuthError::NotSignedIn => "Vous devez être connecté pour accéder à cette page.".to_string(),
            AuthError::Rejected { message, .. } => message.clone(),
            AuthError::Transport(_) | AuthError::Profile(_) => {
                "Une erreur inattendue s'est produite".to_string()
            }
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Returns `None` when the provider requires email confirmation first.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<AuthSession>, AuthError>;

    async fn sign_out(&self, token: &AccessToken) -> Result<(), AuthError>;

    async fn reset_password(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError>;

    /// Session currently held by this client, if any.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError>;

    /// Resolve the user behind an access token (remote check).
    async fn user_for_token(&self, token: &AccessToken) -> Result<Identity, AuthError>;

    /// Auth-state change stream.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
