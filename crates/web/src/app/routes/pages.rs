//! Tenant pages: dashboard, one list per table, quote detail, KPI, settings.

use std::sync::Arc;

use axum::{
    Extension, Form, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use chrono::Utc;
use leptos::{IntoView, view};

use crm_billing::SubscriptionStatus;
use crm_core::{Cents, RecordId, Validate};
use crm_infra::{DataError, Notification};
use crm_invoicing::{Facture, Paiement};
use crm_parties::{Contact, Entreprise};
use crm_products::CatalogueItem;
use crm_sales::{Devis, DevisItem, Prestation};
use crm_support::{Reclamation, Tache};
use crm_tenancy::OrganizationPatch;

use crate::app::dto::{ListFilter, SettingsForm};
use crate::app::kpi;
use crate::app::listing::Listing;
use crate::app::services::AppServices;
use crate::app::views::{DataTable, Panel, SearchBox, Stats, TextInput};
use crate::context::{RequestSession, TenantContext};

pub fn router() -> Router {
    let router = Router::new()
        .route("/", get(dashboard))
        // Return address of the payment provider after checkout.
        .route("/dashboard", get(dashboard))
        .route("/devis/:id", get(devis_detail));
    let router = list::<Contact>(router);
    let router = list::<Entreprise>(router);
    let router = list::<CatalogueItem>(router);
    let router = list::<Devis>(router);
    let router = list::<Prestation>(router);
    let router = list::<Facture>(router);
    let router = list::<Paiement>(router);
    let router = list::<Tache>(router);
    list::<Reclamation>(router)
}

fn list<R: Listing>(router: Router) -> Router {
    router.route(R::PATH, get(list_page::<R>))
}

/// Page for the tenant, with pending notifications drained.
fn render<F, V>(session: &RequestSession, tenant: &TenantContext, status: StatusCode, title: impl Into<String>, content: F) -> Response
where
    F: FnOnce() -> V + 'static,
    V: IntoView,
{
    let notifications = tenant.data().notifications().drain(tenant.data().user());
    let body = super::page(session, Some(tenant.organization()), notifications, title, content);
    (status, Html(body)).into_response()
}

fn load_failed(session: &RequestSession, tenant: &TenantContext, title: &str, err: &DataError) -> Response {
    tracing::error!(organization_id = %tenant.data().organization(), error = %err, "error loading page data");
    let message = err.user_message("Une erreur est survenue lors du chargement des données.");
    render(session, tenant, StatusCode::BAD_GATEWAY, title, move || {
        view! { <Panel title="Erreur" description=message/> }
    })
}

pub async fn dashboard(
    Extension(session): Extension<RequestSession>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    let data = tenant.data();
    let (contacts, entreprises, devis, factures) = (
        data.repository::<Contact>(),
        data.repository::<Entreprise>(),
        data.repository::<Devis>(),
        data.repository::<Facture>(),
    );
    let loaded = tokio::try_join!(contacts.list(), entreprises.list(), devis.list(), factures.list());
    let (contacts, entreprises, devis, factures) = match loaded {
        Ok(rows) => rows,
        Err(e) => return load_failed(&session, &tenant, "Tableau de bord", &e),
    };

    let stats = kpi::dashboard(&contacts, &entreprises, &devis, &factures, Utc::now().date_naive());
    let recent: Vec<Vec<String>> = devis.iter().take(5).map(|d| d.cells()).collect();
    let figures = vec![
        ("Contacts", stats.contacts.to_string()),
        ("Entreprises", stats.entreprises.to_string()),
        ("Devis en cours", stats.open_devis.to_string()),
        ("Chiffre d'affaires du mois", stats.monthly_revenue.to_string()),
    ];
    render(&session, &tenant, StatusCode::OK, "Tableau de bord", move || {
        view! {
            <Stats items=figures/>
            <h2>"Derniers devis"</h2>
            <DataTable headers=Devis::HEADERS rows=recent/>
        }
    })
}

pub async fn list_page<R: Listing>(
    Extension(session): Extension<RequestSession>,
    Extension(tenant): Extension<TenantContext>,
    Query(filter): Query<ListFilter>,
) -> Response {
    let rows = match tenant.data().repository::<R>().list().await {
        Ok(rows) => rows,
        Err(e) => return load_failed(&session, &tenant, R::TITLE, &e),
    };

    let needle = filter.needle();
    let shown: Vec<&R> = rows
        .iter()
        .filter(|row| needle.as_deref().is_none_or(|n| row.matches(n)))
        .collect();
    let cells: Vec<Vec<String>> = shown.iter().map(|row| row.cells()).collect();
    let links: Vec<String> = shown
        .iter()
        .map(|row| row.detail_path())
        .collect::<Option<_>>()
        .unwrap_or_default();
    let count = format!("{} élément(s)", shown.len());
    let query = filter.q.unwrap_or_default();

    render(&session, &tenant, StatusCode::OK, R::TITLE, move || {
        view! {
            <SearchBox action=R::PATH query=query/>
            <p>{count}</p>
            <DataTable headers=R::HEADERS rows=cells links=links/>
        }
    })
}

/// Columns of the quote lines table.
const ITEM_HEADERS: &[&str] = &["Article", "Quantité", "Prix unitaire", "Remise", "Total HT"];

pub async fn devis_detail(
    Extension(session): Extension<RequestSession>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<RecordId>,
) -> Response {
    let data = tenant.data();
    let devis = match data.repository::<Devis>().get(id).await {
        Ok(Some(devis)) => devis,
        Ok(None) => {
            return render(&session, &tenant, StatusCode::NOT_FOUND, "Devis", || {
                view! { <Panel title="Devis introuvable" description="Ce devis n'existe pas ou n'est plus accessible."/> }
            });
        }
        Err(e) => return load_failed(&session, &tenant, "Devis", &e),
    };
    let items = match data.repository::<DevisItem>().list_where("devis_id", id).await {
        Ok(items) => items,
        Err(e) => return load_failed(&session, &tenant, "Devis", &e),
    };

    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            vec![
                item.catalogue
                    .as_ref()
                    .map(|c| c.nom.clone())
                    .unwrap_or_else(|| "—".to_string()),
                item.quantite.to_string(),
                item.prix_unitaire.map(|p| p.to_string()).unwrap_or_else(|| "—".to_string()),
                item.remise.map(|r| format!("{r} %")).unwrap_or_else(|| "—".to_string()),
                item.total_ht().to_string(),
            ]
        })
        .collect();
    let total: Cents = items.iter().map(DevisItem::total_ht).sum();
    let total = format!("Total HT des lignes : {total}");
    let locked = devis.is_locked();
    let summary = vec![devis.cells()];

    render(&session, &tenant, StatusCode::OK, format!("Devis {}", devis.numero_devis), move || {
        view! {
            <DataTable headers=Devis::HEADERS rows=summary/>
            {locked.then(|| view! { <p>"Ce devis est verrouillé."</p> })}
            <DataTable headers=ITEM_HEADERS rows=rows/>
            <p>{total}</p>
        }
    })
}

pub async fn kpi_page(Extension(session): Extension<RequestSession>, Extension(tenant): Extension<TenantContext>) -> Response {
    let data = tenant.data();
    let (devis, factures, paiements, reclamations, taches) = (
        data.repository::<Devis>(),
        data.repository::<Facture>(),
        data.repository::<Paiement>(),
        data.repository::<Reclamation>(),
        data.repository::<Tache>(),
    );
    let loaded = tokio::try_join!(
        devis.list(),
        factures.list(),
        paiements.list(),
        reclamations.list(),
        taches.list(),
    );
    let (devis, factures, paiements, reclamations, taches) = match loaded {
        Ok(rows) => rows,
        Err(e) => return load_failed(&session, &tenant, "KPI", &e),
    };

    let report = kpi::kpi(&devis, &factures, &paiements, &reclamations, &taches, Utc::now().date_naive());
    let conversion = report
        .conversion_rate
        .map(|rate| format!("{rate:.1} %"))
        .unwrap_or_else(|| "—".to_string());
    let figures = vec![
        ("Taux de conversion des devis", conversion),
        ("Total facturé", report.invoiced_total.to_string()),
        ("Paiements reçus", report.received_payments.to_string()),
        ("Encours clients", report.outstanding.to_string()),
        ("Réclamations ouvertes", report.open_claims.to_string()),
        ("Tâches en retard", report.overdue_tasks.to_string()),
    ];
    render(&session, &tenant, StatusCode::OK, "KPI", move || view! { <Stats items=figures/> })
}

fn subscription_label(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Pending => "En attente de paiement",
        SubscriptionStatus::Active => "Actif",
        SubscriptionStatus::PastDue => "Paiement en retard",
        SubscriptionStatus::Canceled => "Résilié",
        SubscriptionStatus::Unknown => "Inconnu",
    }
}

pub async fn settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    let organization = &tenant.organization().organization;
    let subscription = match services.checkout.subscription(organization.id).await {
        Ok(Some(sub)) => format!(
            "Plan : {} ({})",
            sub.plan_name.as_deref().unwrap_or("—"),
            subscription_label(sub.status)
        ),
        Ok(None) => "Aucun abonnement.".to_string(),
        Err(e) => {
            tracing::warn!(organization_id = %organization.id, error = %e, "subscription lookup failed");
            "Abonnement indisponible.".to_string()
        }
    };
    let name = organization.name.clone();
    let description = organization.description.clone().unwrap_or_default();

    render(&session, &tenant, StatusCode::OK, "Paramètres", move || {
        view! {
            <section>
                <h2>"Organisation"</h2>
                <form method="post" action="/settings">
                    <TextInput name="name" label="Nom" value=name/>
                    <TextInput name="description" label="Description" value=description/>
                    <button type="submit">"Enregistrer"</button>
                </form>
            </section>
            <section>
                <h2>"Abonnement"</h2>
                <p>{subscription}</p>
                <p><a href="/pricing">"Changer de plan"</a></p>
            </section>
        }
    })
}

pub async fn update_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    Extension(tenant): Extension<TenantContext>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let user = tenant.data().user();
    let notifications = tenant.data().notifications();
    let patch = OrganizationPatch {
        name: Some(form.name.trim().to_string()),
        description: Some(form.description.trim().to_string()),
    };
    if let Err(e) = patch.validate() {
        notifications.push(user, Notification::error(e.to_string()));
        return Redirect::to("/settings").into_response();
    }
    let Some((_, token)) = session.subject() else {
        return Redirect::to(crm_auth::LOGIN_PATH).into_response();
    };

    match services
        .onboarding
        .update_organization(&token, user, tenant.organization().id(), &patch)
        .await
    {
        Ok(()) => {
            tracing::info!(organization_id = %tenant.organization().id(), "organization settings updated");
            notifications.push(
                user,
                Notification::success(
                    "Organisation mise à jour",
                    "Les informations de votre organisation ont été sauvegardées.",
                ),
            );
        }
        Err(e) => {
            tracing::error!(organization_id = %tenant.organization().id(), error = %e, "error updating organization");
            notifications.push(user, Notification::error("Impossible de mettre à jour l'organisation."));
        }
    }
    Redirect::to("/settings").into_response()
}
