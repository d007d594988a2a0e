//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: which store, auth provider and payment gateway are used
//! - `routes/`: handlers, one file per area
//! - `listing.rs`: how each tenant table is listed and served as JSON
//! - `views.rs`: leptos components rendered server-side
//! - `kpi.rs`: dashboard and KPI figures
//! - `dto.rs`: form and JSON bodies
//! - `errors.rs`: consistent error responses and the panic boundary

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, ConfigError};
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod kpi;
pub mod listing;
pub mod routes;
pub mod services;
pub mod views;

use services::AppServices;

/// Build the full HTTP router from configuration (entrypoint used by `main.rs`).
pub fn build_app(config: &AppConfig) -> Result<Router, ConfigError> {
    config.validate()?;
    Ok(build_router(AppServices::from_config(config)))
}

/// Router over already wired services (also used by the black-box tests).
pub fn build_router(services: AppServices) -> Router {
    let services = Arc::new(services);

    let router = routes::router(services.clone())
        .fallback(routes::system::not_found)
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(services, middleware::session));
    with_boundary(router)
}

/// Outermost layers: request tracing and the panic boundary.
fn with_boundary(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(errors::panic_response)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn panicking_handler_gets_the_apology_page() {
        let app = with_boundary(Router::new().route("/boom", get(explode)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let res = reqwest::get(format!("http://{addr}/boom")).await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body = res.text().await.unwrap();
        assert!(body.contains("Une erreur inattendue"));
        assert!(body.contains("Veuillez recharger la page"));

        server.abort();
    }
}
