//! Organization resolver: one membership lookup per session, manual refetch.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crm_auth::AccessToken;
use crm_core::{Loadable, UserId};

use crate::ResolvedOrganization;

/// `Loading` → `Ready(Some)` (member), `Ready(None)` (no organization yet) or
/// `Failed` (lookup error).
pub type OrganizationState = Loadable<Option<ResolvedOrganization>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("organization lookup failed: {0}")]
    Remote(String),

    #[error("user belongs to more than one organization")]
    MultipleMemberships,
}

/// Where memberships are read from (`organization_members` ⋈ `organizations`).
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// `Ok(None)` when the user has no membership row (yet).
    async fn membership_for(&self, token: &AccessToken, user: UserId) -> Result<Option<ResolvedOrganization>, LookupError>;
}

pub struct OrganizationResolver {
    source: Arc<dyn MembershipSource>,
    state: watch::Sender<OrganizationState>,
    subject: Mutex<Option<(AccessToken, UserId)>>,
    scope: CancellationToken,
}

impl OrganizationResolver {
    pub fn new(source: Arc<dyn MembershipSource>) -> Self {
        Self::scoped(source, CancellationToken::new())
    }

    /// Resolver whose lookups stop committing once `scope` is cancelled
    /// (e.g. the owning page or request went away).
    pub fn scoped(source: Arc<dyn MembershipSource>, scope: CancellationToken) -> Self {
        let (state, _) = watch::channel(Loadable::Loading);
        Self {
            source,
            state,
            subject: Mutex::new(None),
            scope,
        }
    }

    pub fn state(&self) -> OrganizationState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<OrganizationState> {
        self.state.subscribe()
    }

    /// Look up the organization of `user`.
    pub async fn resolve(&self, token: AccessToken, user: UserId) -> OrganizationState {
        self.bind(token.clone(), user);
        self.lookup(token, user).await
    }

    /// Remember whose organization a later [`refetch`](Self::refetch) looks
    /// up, without issuing a lookup now.
    pub fn bind(&self, token: AccessToken, user: UserId) {
        if let Ok(mut subject) = self.subject.lock() {
            *subject = Some((token, user));
        }
    }

    /// Re-issue the last lookup. Idempotent: no backoff and no polling, the
    /// caller decides when to retry.
    pub async fn refetch(&self) -> OrganizationState {
        let subject = self.subject.lock().ok().and_then(|s| s.clone());
        match subject {
            Some((token, user)) => self.lookup(token, user).await,
            None => self.state(),
        }
    }

    /// Forget the current subject (sign-out).
    pub fn clear(&self) {
        if let Ok(mut subject) = self.subject.lock() {
            *subject = None;
        }
        self.state.send_replace(Loadable::Ready(None));
    }

    pub fn cancel(&self) {
        self.scope.cancel();
    }

    async fn lookup(&self, token: AccessToken, user: UserId) -> OrganizationState {
        if self.scope.is_cancelled() {
            return self.state();
        }
        self.state.send_replace(Loadable::Loading);

        let result = tokio::select! {
            _ = self.scope.cancelled() => {
                tracing::debug!(user_id = %user, "organization lookup cancelled");
                return self.state();
            }
            result = self.source.membership_for(&token, user) => result,
        };

        let next = match result {
            Ok(Some(resolved)) => {
                tracing::debug!(user_id = %user, organization_id = %resolved.id(), "organization resolved");
                Loadable::Ready(Some(resolved))
            }
            Ok(None) => {
                tracing::info!(user_id = %user, "no organization yet for user");
                Loadable::Ready(None)
            }
            Err(e) => {
                tracing::error!(user_id = %user, error = %e, "error fetching organization");
                Loadable::Failed(e.to_string())
            }
        };
        self.state.send_replace(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Membership, Organization};
    use crm_auth::Role;
    use crm_core::{OrganizationId, RecordId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolved_for(user: UserId) -> ResolvedOrganization {
        let id = OrganizationId::new();
        ResolvedOrganization {
            organization: Organization {
                id,
                name: "Atelier Dupont".to_string(),
                slug: "atelier-dupont".to_string(),
                description: None,
                settings: None,
            },
            membership: Membership {
                id: RecordId::new(),
                organization_id: id,
                user_id: user,
                role: Role::Admin,
                joined_at: None,
            },
        }
    }

    /// Replays scripted answers, then repeats the last one.
    struct Scripted {
        answers: Mutex<Vec<Result<Option<ResolvedOrganization>, LookupError>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MembershipSource for Scripted {
        async fn membership_for(&self, _token: &AccessToken, _user: UserId) -> Result<Option<ResolvedOrganization>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0].clone()
            }
        }
    }

    struct Never;

    #[async_trait]
    impl MembershipSource for Never {
        async fn membership_for(&self, _token: &AccessToken, _user: UserId) -> Result<Option<ResolvedOrganization>, LookupError> {
            std::future::pending().await
        }
    }

    fn scripted(answers: Vec<Result<Option<ResolvedOrganization>, LookupError>>) -> Arc<Scripted> {
        Arc::new(Scripted {
            answers: Mutex::new(answers),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn starts_loading_and_resolves_membership() {
        let user = UserId::new();
        let resolver = OrganizationResolver::new(scripted(vec![Ok(Some(resolved_for(user)))]));
        assert!(resolver.state().is_loading());

        let state = resolver.resolve(AccessToken::new("t"), user).await;
        assert_eq!(state.ready().and_then(|o| o.as_ref()).map(|o| o.membership.user_id), Some(user));
    }

    #[tokio::test]
    async fn no_membership_is_not_an_error() {
        let resolver = OrganizationResolver::new(scripted(vec![Ok(None)]));
        let state = resolver.resolve(AccessToken::new("t"), UserId::new()).await;
        assert_eq!(state, Loadable::Ready(None));
    }

    #[tokio::test]
    async fn refetch_recovers_after_failure() {
        let user = UserId::new();
        let source = scripted(vec![
            Err(LookupError::Remote("503".to_string())),
            Ok(Some(resolved_for(user))),
        ]);
        let resolver = OrganizationResolver::new(source.clone());

        assert!(matches!(resolver.resolve(AccessToken::new("t"), user).await, Loadable::Failed(_)));
        assert!(matches!(resolver.refetch().await, Loadable::Ready(Some(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refetch_without_subject_is_a_no_op() {
        let source = scripted(vec![Ok(None)]);
        let resolver = OrganizationResolver::new(source.clone());
        assert!(resolver.refetch().await.is_loading());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bound_subject_is_looked_up_on_refetch_only() {
        let user = UserId::new();
        let source = scripted(vec![Ok(Some(resolved_for(user)))]);
        let resolver = OrganizationResolver::new(source.clone());

        resolver.bind(AccessToken::new("t"), user);
        assert!(resolver.state().is_loading());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        assert!(matches!(resolver.refetch().await, Loadable::Ready(Some(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_lookup_does_not_commit() {
        let scope = CancellationToken::new();
        let resolver = Arc::new(OrganizationResolver::scoped(Arc::new(Never), scope.clone()));

        let task = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(AccessToken::new("t"), UserId::new()).await })
        };
        tokio::task::yield_now().await;
        scope.cancel();

        let state = task.await.unwrap();
        assert!(state.is_loading());
        assert!(resolver.state().is_loading());
    }

    #[tokio::test]
    async fn clear_forgets_the_subject() {
        let user = UserId::new();
        let resolver = OrganizationResolver::new(scripted(vec![Ok(Some(resolved_for(user)))]));
        resolver.resolve(AccessToken::new("t"), user).await;

        resolver.clear();
        assert_eq!(resolver.state(), Loadable::Ready(None));
        assert_eq!(resolver.refetch().await, Loadable::Ready(None));
    }
}
