//! Session store: the current identity and its cached profile.
//!
//! A [`Session`] is an explicit object handed to whoever needs it; it is
//! created at start-up (or per request on the server) and torn down with
//! [`Session::shutdown`].

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crm_core::{Loadable, UserId};

use crate::{AccessToken, AuthError, AuthEvent, AuthProvider, AuthSession, Identity, Profile, SignUpRequest};

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub identity: Loadable<Option<Identity>>,
    pub profile: Loadable<Option<Profile>>,
    pub access_token: Option<AccessToken>,
}

impl SessionSnapshot {
    pub fn signed_out() -> Self {
        Self {
            identity: Loadable::Ready(None),
            profile: Loadable::Ready(None),
            access_token: None,
        }
    }

    pub fn identity_pending(&self) -> bool {
        self.identity.is_loading()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.ready().and_then(Option::as_ref)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.ready().and_then(Option::as_ref)
    }
}

/// Where profiles are read from (the `profiles` table in practice).
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, token: &AccessToken, user: UserId) -> Result<Option<Profile>, AuthError>;
}

pub struct Session {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileSource>,
    state: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(provider: Arc<dyn AuthProvider>, profiles: Arc<dyn ProfileSource>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Arc::new(Self {
            provider,
            profiles,
            state,
            cancel: CancellationToken::new(),
            listener: Mutex::new(None),
        })
    }

    /// Session for an already authenticated caller (server-side requests).
    pub async fn established(
        provider: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileSource>,
        session: AuthSession,
    ) -> Arc<Self> {
        let this = Self::new(provider, profiles);
        this.establish(Some(session)).await;
        this
    }

    /// Load the provider's current session and follow its auth-state stream.
    pub async fn start(self: &Arc<Self>) {
        // Subscribe before reading the current session so no transition is missed.
        let events = self.provider.subscribe();

        let current = match self.provider.current_session().await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "failed to retrieve current session; starting signed out");
                None
            }
        };
        self.establish(current).await;

        let handle = tokio::spawn(listen(Arc::downgrade(self), events, self.cancel.clone()));
        if let Ok(mut slot) = self.listener.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let session = self.provider.sign_in(email, password).await?;
        tracing::info!(user_id = %session.identity.id, "signed in");
        self.establish(Some(session)).await;
        Ok(())
    }

    /// Returns `true` when the account is usable right away, `false` when the
    /// provider first wants the email confirmed.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<bool, AuthError> {
        match self.provider.sign_up(request).await? {
            Some(session) => {
                self.establish(Some(session)).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.snapshot().access_token.ok_or(AuthError::NotSignedIn)?;
        self.provider.sign_out(&token).await?;
        self.establish(None).await;
        Ok(())
    }

    pub async fn reset_password(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        self.provider.reset_password(email, redirect_to).await
    }

    /// Re-fetch the profile of the current identity (e.g. after an update).
    pub async fn refresh_profile(&self) {
        let snapshot = self.snapshot();
        if let (Some(identity), Some(token)) = (snapshot.identity(), snapshot.access_token.as_ref()) {
            self.load_profile(token, identity.id).await;
        }
    }

    /// Apply an auth-state transition: set the identity, then (re)load the profile.
    pub async fn establish(&self, session: Option<AuthSession>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(session) = session else {
            self.state.send_replace(SessionSnapshot::signed_out());
            return;
        };

        let user = session.identity.id;
        let token = session.access_token.clone();
        self.state.send_modify(|snap| {
            let same_user = snap.identity().map(|i| i.id) == Some(user);
            snap.identity = Loadable::Ready(Some(session.identity));
            snap.access_token = Some(session.access_token);
            if !same_user {
                snap.profile = Loadable::Loading;
            }
        });

        self.load_profile(&token, user).await;
    }

    /// Stop following the auth-state stream and clear local state.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Ok(mut slot) = self.listener.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        self.state.send_replace(SessionSnapshot::signed_out());
    }

    async fn load_profile(&self, token: &AccessToken, user: UserId) {
        let result = self.profiles.fetch_profile(token, user).await;
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_modify(|snap| {
            // The identity may have changed while the fetch was in flight.
            if snap.identity().map(|i| i.id) != Some(user) {
                return;
            }
            snap.profile = match result {
                Ok(profile) => Loadable::Ready(profile),
                Err(e) => {
                    tracing::error!(user_id = %user, error = %e, "error fetching profile");
                    Loadable::Failed(e.to_string())
                }
            };
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(session: Weak<Session>, mut events: broadcast::Receiver<AuthEvent>, cancel: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(session) = session.upgrade() else { break };
        match event {
            Ok(event) => {
                tracing::debug!(?event, "auth state changed");
                session.establish(event.session().cloned()).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "auth events lagged; resynchronizing");
                let current = session.provider.current_session().await.ok().flatten();
                session.establish(current).await;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
