//! JSON access to every tenant table, one resource per record type.

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use crm_core::{Record, RecordId};
use crm_invoicing::{Facture, Paiement};
use crm_parties::{Contact, Entreprise};
use crm_products::CatalogueItem;
use crm_sales::{Devis, DevisItem, Prestation};
use crm_support::{Reclamation, Tache};

use crate::app::dto::DevisItemInput;
use crate::app::errors::{self, data_error_to_response};
use crate::app::listing::Listing;
use crate::context::TenantContext;

pub fn router() -> Router {
    let router = Router::new().route("/api/devis/:id/items", get(list_items).post(add_item));
    let router = resource::<Contact>(router);
    let router = resource::<Entreprise>(router);
    let router = resource::<CatalogueItem>(router);
    let router = resource::<Devis>(router);
    let router = resource::<Prestation>(router);
    let router = resource::<Facture>(router);
    let router = resource::<Paiement>(router);
    let router = resource::<Tache>(router);
    resource::<Reclamation>(router)
}

fn resource<R: Listing>(router: Router) -> Router {
    router
        .route(&format!("/api/{}", R::TABLE), get(list::<R>).post(create::<R>))
        .route(
            &format!("/api/{}/:id", R::TABLE),
            get(fetch::<R>).patch(update::<R>).delete(remove::<R>),
        )
}

fn parse_id(raw: &str) -> Result<RecordId, Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid record id"))
}

pub async fn list<R: Record>(Extension(tenant): Extension<TenantContext>) -> Response {
    match tenant.data().repository::<R>().list().await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => data_error_to_response(e),
    }
}

pub async fn create<R: Listing>(
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<R::Create>,
) -> Response {
    match tenant.data().repository::<R>().create(&body).await {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(e) => data_error_to_response(e),
    }
}

pub async fn fetch<R: Record>(Extension(tenant): Extension<TenantContext>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match tenant.data().repository::<R>().get(id).await {
        Ok(Some(row)) => Json(row).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("no {} row {id}", R::TABLE)),
        Err(e) => data_error_to_response(e),
    }
}

pub async fn update<R: Listing>(
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(patch): Json<R::Patch>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match tenant.data().repository::<R>().update(id, &patch).await {
        Ok(row) => Json(row).into_response(),
        Err(e) => data_error_to_response(e),
    }
}

pub async fn remove<R: Record>(Extension(tenant): Extension<TenantContext>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match tenant.data().repository::<R>().delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => data_error_to_response(e),
    }
}

/// Quote lines carry no organization of their own, so the parent quote is
/// looked up first: a quote outside the tenant yields 404 instead of lines.
async fn parent_devis(tenant: &TenantContext, raw: &str) -> Result<RecordId, Response> {
    let id = parse_id(raw)?;
    match tenant.data().repository::<Devis>().get(id).await {
        Ok(Some(devis)) => Ok(devis.id),
        Ok(None) => Err(errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("no devis {id}"))),
        Err(e) => Err(data_error_to_response(e)),
    }
}

pub async fn list_items(Extension(tenant): Extension<TenantContext>, Path(id): Path<String>) -> Response {
    let devis_id = match parent_devis(&tenant, &id).await {
        Ok(id) => id,
        Err(response) => return response,
    };
    match tenant.data().repository::<DevisItem>().list_where("devis_id", devis_id).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => data_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<DevisItemInput>,
) -> Response {
    let devis_id = match parent_devis(&tenant, &id).await {
        Ok(id) => id,
        Err(response) => return response,
    };
    match tenant.data().repository::<DevisItem>().create(&body.into_item(devis_id)).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => data_error_to_response(e),
    }
}
