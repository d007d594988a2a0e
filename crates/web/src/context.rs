use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crm_auth::{AccessToken, Identity, Session, SessionSnapshot};
use crm_infra::DataContext;
use crm_tenancy::{OrganizationResolver, ResolvedOrganization};

/// Session of the caller for the lifetime of one request.
///
/// Present on every request (signed in or not). Torn down by the session
/// middleware once the response is produced; `cancel` fires if the client
/// goes away first.
#[derive(Clone)]
pub struct RequestSession {
    session: Arc<Session>,
    resolver: Arc<OrganizationResolver>,
    cancel: CancellationToken,
}

impl RequestSession {
    pub fn new(session: Arc<Session>, resolver: Arc<OrganizationResolver>, cancel: CancellationToken) -> Self {
        Self {
            session,
            resolver,
            cancel,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn resolver(&self) -> &Arc<OrganizationResolver> {
        &self.resolver
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Identity and token of a signed-in caller.
    pub fn subject(&self) -> Option<(Identity, AccessToken)> {
        let snapshot = self.snapshot();
        let identity = snapshot.identity()?.clone();
        let token = snapshot.access_token?;
        Some((identity, token))
    }
}

/// Tenant context for a request that passed the whole gating chain.
///
/// Immutable; every tenant page and data endpoint reads through it.
#[derive(Clone)]
pub struct TenantContext {
    organization: ResolvedOrganization,
    data: DataContext,
}

impl TenantContext {
    pub fn new(organization: ResolvedOrganization, data: DataContext) -> Self {
        Self { organization, data }
    }

    pub fn organization(&self) -> &ResolvedOrganization {
        &self.organization
    }

    pub fn data(&self) -> &DataContext {
        &self.data
    }
}
