//! Request session extraction and the gating chain
//! (Route Guard → Organization Gate → Onboarding Gate → page).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use leptos::{IntoView, view};
use tokio_util::sync::CancellationToken;

use crm_auth::{AccessToken, AuthSession, GuardDecision, LOGIN_PATH, RouteGuard, Session};
use crm_infra::DataContext;
use crm_onboarding::{ONBOARDING_PATH, OnboardingDecision, OnboardingGate};
use crm_tenancy::{OrganizationGate, OrganizationGateView, OrganizationResolver};

use crate::app::errors::json_error;
use crate::app::services::AppServices;
use crate::app::views::{self, Panel, Retry};
use crate::context::{RequestSession, TenantContext};

/// Cookie carrying the access token for browser requests.
pub const SESSION_COOKIE: &str = "sb-access-token";

/// Target of the organization panels' retry form.
pub const RETRY_PATH: &str = "/organization/retry";

/// Access token from `Authorization: Bearer` or, failing that, the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty())
}

/// Build the caller's session from a bearer token. Tokens are verified
/// locally; an invalid or expired one yields a signed-out session.
pub async fn open_session(services: &AppServices, token: Option<&str>) -> Arc<Session> {
    let auth = services.auth.clone();
    let profiles = services.profiles.clone();
    let Some(token) = token else {
        let session = Session::new(auth, profiles);
        session.establish(None).await;
        return session;
    };

    match services.validator.validate(token, Utc::now()) {
        Ok(claims) => {
            let established = AuthSession {
                access_token: AccessToken::new(token),
                refresh_token: None,
                identity: claims.identity(),
                expires_at: claims.expires_at(),
            };
            Session::established(auth, profiles, established).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejecting access token");
            let session = Session::new(auth, profiles);
            session.establish(None).await;
            session
        }
    }
}

/// Attach a [`RequestSession`] to every request and tear it down afterwards.
pub async fn session(State(services): State<Arc<AppServices>>, mut req: Request, next: Next) -> Response {
    let cancel = CancellationToken::new();
    // Fires if the client disconnects and this future is dropped mid-flight.
    let _abort = cancel.clone().drop_guard();

    let session = open_session(&services, extract_token(req.headers())).await;
    let resolver = Arc::new(OrganizationResolver::scoped(
        services.memberships.clone(),
        cancel.child_token(),
    ));
    req.extensions_mut()
        .insert(RequestSession::new(session.clone(), resolver.clone(), cancel.clone()));

    let response = next.run(req).await;

    resolver.cancel();
    session.shutdown();
    response
}

/// How gate outcomes are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Html,
    Json,
}

impl Surface {
    fn login(self) -> Response {
        match self {
            Surface::Html => Redirect::to(LOGIN_PATH).into_response(),
            Surface::Json => json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required"),
        }
    }

    fn denied(self) -> Response {
        match self {
            Surface::Html => panel_page(
                StatusCode::FORBIDDEN,
                "Accès refusé",
                "Vous n'avez pas les permissions nécessaires pour accéder à cette page.",
                None,
            ),
            Surface::Json => json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient role"),
        }
    }

    /// Nothing to show yet: identity, profile or organization still settling.
    fn hold(self) -> Response {
        match self {
            Surface::Html => {
                let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                response
            }
            Surface::Json => json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "session_unavailable",
                "session is still loading",
            ),
        }
    }

    fn organization_error(self, return_to: &str) -> Response {
        match self {
            Surface::Html => panel_page(
                StatusCode::SERVICE_UNAVAILABLE,
                "Erreur",
                "Une erreur est survenue lors du chargement de votre organisation.",
                Some(retry("Réessayer", return_to)),
            ),
            Surface::Json => json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "organization_unavailable",
                "organization lookup failed",
            ),
        }
    }

    fn provisioning(self, return_to: &str) -> Response {
        match self {
            Surface::Html => panel_page(
                StatusCode::OK,
                "Organisation en cours de création",
                "Votre organisation est en cours de création. Cela peut prendre quelques instants.",
                Some(retry("Vérifier à nouveau", return_to)),
            ),
            Surface::Json => json_error(
                StatusCode::CONFLICT,
                "organization_provisioning",
                "organization is being provisioned",
            ),
        }
    }

    /// Signed in, but the profile row does not exist (yet).
    fn missing_profile(self, return_to: &str) -> Response {
        match self {
            Surface::Html => panel_page(
                StatusCode::OK,
                "Profil en cours de création",
                "Votre profil utilisateur est en cours de création. Cela peut prendre quelques instants.",
                Some(retry("Vérifier à nouveau", return_to)),
            ),
            Surface::Json => json_error(StatusCode::CONFLICT, "profile_missing", "no profile for this account yet"),
        }
    }

    fn onboarding(self) -> Response {
        match self {
            Surface::Html => Redirect::to(ONBOARDING_PATH).into_response(),
            Surface::Json => json_error(
                StatusCode::PRECONDITION_REQUIRED,
                "onboarding_required",
                "onboarding must be completed first",
            ),
        }
    }
}

fn retry(label: &'static str, return_to: &str) -> Retry {
    Retry {
        label,
        return_to: return_to.to_string(),
    }
}

/// Standalone page holding a single [`Panel`].
fn panel_page(status: StatusCode, title: &'static str, description: &'static str, retry: Option<Retry>) -> Response {
    let body = views::document(title.to_string(), None, Vec::new(), move || match retry {
        Some(retry) => view! { <Panel title=title description=description retry=retry/> }.into_view(),
        None => view! { <Panel title=title description=description/> }.into_view(),
    });
    (status, Html(body)).into_response()
}

/// Gating configuration of one group of routes.
#[derive(Clone)]
pub struct Gate {
    services: Arc<AppServices>,
    guard: RouteGuard,
    surface: Surface,
    tenant: bool,
}

impl Gate {
    /// Full chain: guard, organization, onboarding.
    pub fn tenant(services: Arc<AppServices>, guard: RouteGuard, surface: Surface) -> Self {
        Self {
            services,
            guard,
            surface,
            tenant: true,
        }
    }

    /// Guard only, for pages that work without an organization.
    pub fn signed_in(services: Arc<AppServices>, surface: Surface) -> Self {
        Self {
            services,
            guard: RouteGuard::authenticated(),
            surface,
            tenant: false,
        }
    }
}

pub async fn gate(
    State(gate): State<Gate>,
    axum::Extension(request_session): axum::Extension<RequestSession>,
    mut req: Request,
    next: Next,
) -> Response {
    let snapshot = request_session.snapshot();
    let path = req.uri().path().to_string();

    match gate.guard.evaluate(&snapshot) {
        GuardDecision::Loading => return gate.surface.hold(),
        GuardDecision::RedirectToLogin => return gate.surface.login(),
        GuardDecision::AccessDenied => {
            tracing::info!(path = %path, required = ?gate.guard.required_role(), "access denied");
            return gate.surface.denied();
        }
        GuardDecision::Allow => {}
    }
    if !gate.tenant {
        return next.run(req).await;
    }

    let Some((identity, token)) = request_session.subject() else {
        return gate.surface.login();
    };
    let resolver = request_session.resolver().clone();
    resolver.resolve(token.clone(), identity.id).await;
    let organization = match OrganizationGate::new(resolver).view(&snapshot.identity) {
        OrganizationGateView::Render(organization) => organization,
        OrganizationGateView::Loading | OrganizationGateView::LoadingOrganization => return gate.surface.hold(),
        OrganizationGateView::AccessDenied => return gate.surface.login(),
        OrganizationGateView::Error { message } => {
            tracing::warn!(user_id = %identity.id, error = %message, "organization unavailable");
            return gate.surface.organization_error(&path);
        }
        OrganizationGateView::Provisioning => return gate.surface.provisioning(&path),
    };

    match OnboardingGate::default().evaluate(&snapshot, &path) {
        OnboardingDecision::Pass => {}
        OnboardingDecision::Hold => return gate.surface.hold(),
        OnboardingDecision::MissingProfile => {
            tracing::warn!(user_id = %identity.id, "signed in without a profile row");
            return gate.surface.missing_profile(&path);
        }
        OnboardingDecision::Redirect => return gate.surface.onboarding(),
    }

    let data = DataContext::new(gate.services.data.clone(), token, identity.id, organization.id())
        .with_cancellation(request_session.cancellation().child_token());
    req.extensions_mut().insert(TenantContext::new(organization, data));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; sb-access-token=from-cookie"));
        assert_eq!(extract_token(&headers), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers), Some("from-header"));
    }

    #[test]
    fn empty_or_foreign_credentials_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token="));
        assert_eq!(extract_token(&headers), None);
    }
}
