use axum::{
    Extension, Form, Json,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use leptos::{IntoView, view};
use serde_json::json;

use crm_tenancy::{OrganizationGate, OrganizationGateView};

use crate::app::dto::{RetryForm, local_path};
use crate::app::views::Panel;
use crate::context::RequestSession;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Catch-all; public, no gate in front of it.
pub async fn not_found(Extension(session): Extension<RequestSession>) -> Response {
    let body = super::page(&session, None, Vec::new(), "404", || {
        view! {
            <Panel title="Page introuvable" description="La page que vous recherchez n'existe pas."/>
            <p><a href="/">"Retour à l'accueil"</a></p>
        }
    });
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

/// Retry action of the organization error and provisioning panels:
/// re-run the lookup, then go back to the page that showed the panel.
pub async fn retry_organization(
    Extension(session): Extension<RequestSession>,
    Form(form): Form<RetryForm>,
) -> Response {
    let target = local_path(form.return_to.as_deref()).to_string();
    let Some((identity, token)) = session.subject() else {
        return Redirect::to(crm_auth::LOGIN_PATH).into_response();
    };

    session.resolver().bind(token, identity.id);
    let gate = OrganizationGate::new(session.resolver().clone());
    match gate.retry(&session.snapshot().identity).await {
        OrganizationGateView::Render(organization) => {
            tracing::info!(user_id = %identity.id, organization_id = %organization.id(), "organization available after retry");
        }
        view => tracing::info!(user_id = %identity.id, ?view, "organization still unavailable after retry"),
    }
    Redirect::to(&target).into_response()
}
