use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderMap, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use leptos::IntoView;

use crm_auth::{Role, RouteGuard};
use crm_infra::Notification;
use crm_tenancy::ResolvedOrganization;

use crate::app::services::AppServices;
use crate::app::views::{self, Nav};
use crate::context::RequestSession;
use crate::middleware::{self, Gate, RETRY_PATH, Surface};

pub mod api;
pub mod auth;
pub mod billing;
pub mod onboarding;
pub mod pages;
pub mod system;

/// Every route, grouped by the gate in front of it.
pub fn router(services: Arc<AppServices>) -> Router {
    let public = Router::new()
        .route("/health", get(system::health))
        .route(RETRY_PATH, post(system::retry_organization))
        .merge(auth::router())
        .merge(billing::router());

    let onboarding = onboarding::router().route_layer(from_fn_with_state(
        Gate::signed_in(services.clone(), Surface::Html),
        middleware::gate,
    ));

    let pages = pages::router().route_layer(from_fn_with_state(
        Gate::tenant(services.clone(), RouteGuard::authenticated(), Surface::Html),
        middleware::gate,
    ));

    let kpi = Router::new().route("/kpi", get(pages::kpi_page)).route_layer(from_fn_with_state(
        Gate::tenant(services.clone(), RouteGuard::with_role(Role::Manager), Surface::Html),
        middleware::gate,
    ));

    let settings = Router::new()
        .route("/settings", get(pages::settings).post(pages::update_settings))
        .route_layer(from_fn_with_state(
            Gate::tenant(services.clone(), RouteGuard::with_role(Role::Admin), Surface::Html),
            middleware::gate,
        ));

    let api = api::router().route_layer(from_fn_with_state(
        Gate::tenant(services, RouteGuard::authenticated(), Surface::Json),
        middleware::gate,
    ));

    public
        .merge(onboarding)
        .merge(pages)
        .merge(kpi)
        .merge(settings)
        .merge(api)
}

/// Header navigation for the signed-in caller, when there is one.
pub(crate) fn nav(session: &RequestSession, organization: Option<&ResolvedOrganization>) -> Option<Nav> {
    let snapshot = session.snapshot();
    let profile = snapshot.profile()?;
    Some(Nav {
        display_name: profile.display_name(),
        organization: organization.map(|o| o.organization.name.clone()).unwrap_or_default(),
        role: profile.role,
    })
}

/// Full page with the caller's navigation and pending notifications.
pub(crate) fn page<F, V>(
    session: &RequestSession,
    organization: Option<&ResolvedOrganization>,
    notifications: Vec<Notification>,
    title: impl Into<String>,
    content: F,
) -> String
where
    F: FnOnce() -> V + 'static,
    V: IntoView,
{
    views::document(title.into(), nav(session, organization), notifications, content)
}

/// Public origin of the request (`Origin`, else `http://{Host}`), used to
/// build links sent by email or by the payment provider.
pub(crate) fn request_origin(headers: &HeaderMap) -> String {
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        return origin.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
