use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leptos::{IntoView, view};
use serde_json::json;

use crm_billing::CheckoutError;
use crm_infra::{DataError, StoreError};

use super::views::{self, Panel};

pub fn data_error_to_response(err: DataError) -> Response {
    match err {
        DataError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        DataError::Store(StoreError::Unauthorized) => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "session expired")
        }
        DataError::Store(StoreError::Forbidden(msg)) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        DataError::Store(StoreError::Conflict(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DataError::AlreadySubmitting => json_error(
            StatusCode::CONFLICT,
            "already_submitting",
            "an identical request is already in progress",
        ),
        DataError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DataError::NotDeletable(table) => json_error(
            StatusCode::METHOD_NOT_ALLOWED,
            "not_deletable",
            format!("{table} rows cannot be deleted"),
        ),
        DataError::Cancelled => json_error(StatusCode::SERVICE_UNAVAILABLE, "cancelled", "request cancelled"),
        other => json_error(StatusCode::BAD_GATEWAY, "store_error", other.to_string()),
    }
}

/// Checkout failures keep the `{ "error": message }` body of the billing endpoint.
pub fn checkout_error_to_response(err: CheckoutError) -> Response {
    let status = match &err {
        CheckoutError::MissingAuthorization | CheckoutError::Authentication(_) => StatusCode::UNAUTHORIZED,
        CheckoutError::MissingEmail | CheckoutError::MissingPlan | CheckoutError::InvalidPlan => {
            StatusCode::BAD_REQUEST
        }
        CheckoutError::NotAMember | CheckoutError::NotAnAdmin => StatusCode::FORBIDDEN,
        CheckoutError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::Gateway(_) | CheckoutError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "checkout failed");
    }
    (status, axum::Json(json!({ "error": err.to_string() }))).into_response()
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Error boundary: a panicking handler still answers with a page.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = detail, "handler panicked");

    let body = views::document("Erreur".to_string(), None, Vec::new(), || {
        view! {
            <Panel
                title="Une erreur inattendue s'est produite"
                description="Veuillez recharger la page. Si le problème persiste, contactez le support."
            />
        }
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::response::Html(body)).into_response()
}
