//! Plans page and checkout. Both are public: the checkout endpoint does its
//! own bearer check and answers `{ "error": message }` on failure.

use std::sync::Arc;

use axum::{
    Extension, Form, Json, Router,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use leptos::{CollectView, IntoView, component, view};
use serde_json::json;

use crm_billing::{CheckoutError, PLANS, Plan};

use crate::app::dto::CheckoutBody;
use crate::app::errors::checkout_error_to_response;
use crate::app::services::AppServices;
use crate::app::views::Alert;
use crate::context::RequestSession;

pub const PRICING_PATH: &str = "/pricing";

pub fn router() -> Router {
    Router::new()
        .route(PRICING_PATH, get(pricing))
        .route("/pricing/checkout", post(checkout_form))
        .route("/api/billing/checkout", post(checkout))
}

async fn start_checkout(
    services: &AppServices,
    session: &RequestSession,
    headers: &HeaderMap,
    body: &CheckoutBody,
) -> Result<String, CheckoutError> {
    let snapshot = session.snapshot();
    let origin = super::request_origin(headers);
    services
        .checkout
        .create_checkout(snapshot.access_token.as_ref(), body.plan_id.as_deref(), &origin)
        .await
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Response {
    match start_checkout(&services, &session, &headers, &body).await {
        Ok(url) => Json(json!({ "url": url })).into_response(),
        Err(e) => checkout_error_to_response(e),
    }
}

/// Button variant of [`checkout`]: sends the browser to the provider.
pub async fn checkout_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    headers: HeaderMap,
    Form(body): Form<CheckoutBody>,
) -> Response {
    match start_checkout(&services, &session, &headers, &body).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            tracing::info!(error = %e, "checkout from pricing page failed");
            let status = checkout_error_to_response(e.clone()).status();
            render(&session, status, Some(e.to_string()))
        }
    }
}

pub async fn pricing(Extension(session): Extension<RequestSession>) -> Response {
    render(&session, StatusCode::OK, None)
}

#[component]
fn PlanCard(plan: &'static Plan) -> impl IntoView {
    let price = if plan.is_recurring() {
        format!("{} / mois", plan.display_price())
    } else {
        plan.display_price()
    };
    view! {
        <article class="plan">
            <h2>{plan.name}</h2>
            <p>{plan.description}</p>
            <p class="price">{price}</p>
            <ul>{plan.features.iter().map(|f| view! { <li>{*f}</li> }).collect_view()}</ul>
            <form method="post" action="/pricing/checkout">
                <input type="hidden" name="plan_id" value=plan.id/>
                <button type="submit">{format!("Choisir {}", plan.name)}</button>
            </form>
        </article>
    }
}

fn render(session: &RequestSession, status: StatusCode, error: Option<String>) -> Response {
    let body = super::page(session, None, Vec::new(), "Choisissez votre plan", move || {
        view! {
            {error.map(|message| view! { <Alert message=message/> })}
            <p>"Sélectionnez l'offre adaptée à votre activité."</p>
            <div class="plans">
                {PLANS.iter().map(|plan| view! { <PlanCard plan=plan/> }).collect_view()}
            </div>
        }
    });
    (status, Html(body)).into_response()
}
