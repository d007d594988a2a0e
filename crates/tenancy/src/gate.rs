//! Organization gate: tenant-scoped pages render only once an organization
//! has resolved for the current identity.

use std::sync::Arc;

use serde::Serialize;

use crm_auth::Identity;
use crm_core::Loadable;

use crate::{OrganizationResolver, OrganizationState, ResolvedOrganization};

/// The single thing the gate shows for a given set of inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum OrganizationGateView {
    /// Identity still resolving.
    Loading,
    /// No identity (normally already handled by the route guard).
    AccessDenied,
    /// Organization lookup in flight.
    LoadingOrganization,
    /// Lookup failed; offers a manual retry.
    Error { message: String },
    /// Lookup succeeded but no organization exists yet; offers a manual retry.
    Provisioning,
    Render(ResolvedOrganization),
}

impl OrganizationGateView {
    /// Whether the view offers the retry action.
    pub fn offers_retry(&self) -> bool {
        matches!(self, OrganizationGateView::Error { .. } | OrganizationGateView::Provisioning)
    }
}

/// Strict-priority evaluation of the gate inputs.
pub fn evaluate(identity: &Loadable<Option<Identity>>, organization: &OrganizationState) -> OrganizationGateView {
    match identity {
        Loadable::Loading => return OrganizationGateView::Loading,
        Loadable::Ready(None) | Loadable::Failed(_) => return OrganizationGateView::AccessDenied,
        Loadable::Ready(Some(_)) => {}
    }
    match organization {
        Loadable::Loading => OrganizationGateView::LoadingOrganization,
        Loadable::Failed(message) => OrganizationGateView::Error {
            message: message.clone(),
        },
        Loadable::Ready(None) => OrganizationGateView::Provisioning,
        Loadable::Ready(Some(resolved)) => OrganizationGateView::Render(resolved.clone()),
    }
}

/// Gate bound to a resolver, so the retry action can re-issue the lookup.
pub struct OrganizationGate {
    resolver: Arc<OrganizationResolver>,
}

impl OrganizationGate {
    pub fn new(resolver: Arc<OrganizationResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<OrganizationResolver> {
        &self.resolver
    }

    pub fn view(&self, identity: &Loadable<Option<Identity>>) -> OrganizationGateView {
        evaluate(identity, &self.resolver.state())
    }

    /// Retry action behind the error and provisioning panels.
    pub async fn retry(&self, identity: &Loadable<Option<Identity>>) -> OrganizationGateView {
        self.resolver.refetch().await;
        self.view(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LookupError, Membership, MembershipSource, Organization};
    use async_trait::async_trait;
    use crm_auth::{AccessToken, Role};
    use crm_core::{OrganizationId, RecordId, UserId};

    fn identity() -> Identity {
        Identity {
            id: UserId::new(),
            email: None,
        }
    }

    fn resolved() -> ResolvedOrganization {
        let id = OrganizationId::new();
        ResolvedOrganization {
            organization: Organization {
                id,
                name: "Atelier".to_string(),
                slug: "atelier".to_string(),
                description: None,
                settings: None,
            },
            membership: Membership {
                id: RecordId::new(),
                organization_id: id,
                user_id: UserId::new(),
                role: Role::User,
                joined_at: None,
            },
        }
    }

    fn all_identity_inputs() -> Vec<Loadable<Option<Identity>>> {
        vec![
            Loadable::Loading,
            Loadable::Ready(None),
            Loadable::Ready(Some(identity())),
            Loadable::Failed("x".to_string()),
        ]
    }

    fn all_organization_inputs() -> Vec<OrganizationState> {
        vec![
            Loadable::Loading,
            Loadable::Ready(None),
            Loadable::Ready(Some(resolved())),
            Loadable::Failed("timeout".to_string()),
        ]
    }

    #[test]
    fn priority_order_over_every_input_combination() {
        for identity in all_identity_inputs() {
            for organization in all_organization_inputs() {
                let view = evaluate(&identity, &organization);
                let expected_kind = match (&identity, &organization) {
                    (Loadable::Loading, _) => "loading",
                    (Loadable::Ready(None) | Loadable::Failed(_), _) => "denied",
                    (_, Loadable::Loading) => "loading_org",
                    (_, Loadable::Failed(_)) => "error",
                    (_, Loadable::Ready(None)) => "provisioning",
                    (_, Loadable::Ready(Some(_))) => "render",
                };
                let kind = match view {
                    OrganizationGateView::Loading => "loading",
                    OrganizationGateView::AccessDenied => "denied",
                    OrganizationGateView::LoadingOrganization => "loading_org",
                    OrganizationGateView::Error { .. } => "error",
                    OrganizationGateView::Provisioning => "provisioning",
                    OrganizationGateView::Render(_) => "render",
                };
                assert_eq!(kind, expected_kind, "identity={identity:?} organization={organization:?}");
            }
        }
    }

    #[test]
    fn only_error_and_provisioning_offer_retry() {
        let signed_in = Loadable::Ready(Some(identity()));
        assert!(evaluate(&signed_in, &Loadable::Ready(None)).offers_retry());
        assert!(evaluate(&signed_in, &Loadable::Failed("x".to_string())).offers_retry());
        assert!(!evaluate(&signed_in, &Loadable::Ready(Some(resolved()))).offers_retry());
        assert!(!evaluate(&signed_in, &Loadable::Loading).offers_retry());
    }

    struct AlwaysEmpty;

    #[async_trait]
    impl MembershipSource for AlwaysEmpty {
        async fn membership_for(&self, _token: &AccessToken, _user: UserId) -> Result<Option<ResolvedOrganization>, LookupError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn retry_is_idempotent_without_state_change() {
        let me = identity();
        let resolver = Arc::new(OrganizationResolver::new(Arc::new(AlwaysEmpty)));
        resolver.resolve(AccessToken::new("t"), me.id).await;
        let gate = OrganizationGate::new(resolver);
        let signed_in = Loadable::Ready(Some(me));

        let first = gate.retry(&signed_in).await;
        let second = gate.retry(&signed_in).await;
        assert_eq!(first, OrganizationGateView::Provisioning);
        assert_eq!(first, second);
    }

    struct Flaky {
        calls: std::sync::atomic::AtomicUsize,
        organization: ResolvedOrganization,
    }

    #[async_trait]
    impl MembershipSource for Flaky {
        async fn membership_for(&self, _token: &AccessToken, _user: UserId) -> Result<Option<ResolvedOrganization>, LookupError> {
            match self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) {
                0 => Err(LookupError::Remote("503".to_string())),
                _ => Ok(Some(self.organization.clone())),
            }
        }
    }

    #[tokio::test]
    async fn retry_after_an_error_renders_the_organization() {
        let me = identity();
        let organization = resolved();
        let resolver = Arc::new(OrganizationResolver::new(Arc::new(Flaky {
            calls: Default::default(),
            organization: organization.clone(),
        })));
        resolver.resolve(AccessToken::new("t"), me.id).await;
        let gate = OrganizationGate::new(resolver);
        let signed_in = Loadable::Ready(Some(me));

        assert!(matches!(gate.view(&signed_in), OrganizationGateView::Error { .. }));
        assert_eq!(gate.retry(&signed_in).await, OrganizationGateView::Render(organization));
    }
}
