//! Server-rendered pages. Components are leptos views rendered to a string
//! per response; leptos escapes every text node and attribute value.

use leptos::*;

use crm_auth::Role;
use crm_infra::{Notification, Variant};

use crate::middleware::RETRY_PATH;

/// Header navigation for a signed-in user.
#[derive(Debug, Clone)]
pub struct Nav {
    pub display_name: String,
    pub organization: String,
    pub role: Role,
}

const LINKS: [(&str, &str); 10] = [
    ("/", "Tableau de bord"),
    ("/contacts", "Contacts"),
    ("/entreprises", "Entreprises"),
    ("/catalogue", "Catalogue"),
    ("/devis", "Devis"),
    ("/prestations", "Prestations"),
    ("/factures", "Factures"),
    ("/paiements", "Paiements"),
    ("/taches", "Tâches"),
    ("/reclamations", "Réclamations"),
];

/// Full HTML document around `content`.
pub fn document<F, V>(title: String, nav: Option<Nav>, notifications: Vec<Notification>, content: F) -> String
where
    F: FnOnce() -> V + 'static,
    V: IntoView,
{
    let html = leptos::ssr::render_to_string(move || {
        let content = content().into_view();
        view! { <Layout title=title nav=nav notifications=notifications content=content/> }
    });
    format!("<!DOCTYPE html>\n{html}")
}

#[component]
fn Layout(title: String, nav: Option<Nav>, notifications: Vec<Notification>, content: View) -> impl IntoView {
    let document_title = format!("{title} · CRM");
    view! {
        <html lang="fr">
            <head>
                <meta charset="utf-8"/>
                <title>{document_title}</title>
            </head>
            <body>
                {nav.map(|nav| view! { <Header nav=nav/> })}
                <Toasts notifications=notifications/>
                <main>
                    <h1>{title}</h1>
                    {content}
                </main>
            </body>
        </html>
    }
}

#[component]
fn Header(nav: Nav) -> impl IntoView {
    let mut links: Vec<(&str, &str)> = LINKS.to_vec();
    if nav.role.satisfies(Role::Manager) {
        links.push(("/kpi", "KPI"));
    }
    if nav.role.satisfies(Role::Admin) {
        links.push(("/settings", "Paramètres"));
    }
    view! {
        <header>
            <nav>
                {links.into_iter().map(|(href, label)| view! { <a href=href>{label}</a> }).collect_view()}
            </nav>
            <p>{format!("{} · {}", nav.display_name, nav.organization)}</p>
            <form method="post" action="/auth/sign-out">
                <button type="submit">"Déconnexion"</button>
            </form>
        </header>
    }
}

#[component]
fn Toasts(notifications: Vec<Notification>) -> impl IntoView {
    (!notifications.is_empty()).then(|| {
        view! {
            <ul class="toasts">
                {notifications
                    .into_iter()
                    .map(|n| {
                        let class = match n.variant {
                            Variant::Default => "toast",
                            Variant::Destructive => "toast destructive",
                        };
                        view! {
                            <li class=class role="status">
                                <strong>{n.title}</strong>
                                " "
                                {n.description}
                            </li>
                        }
                    })
                    .collect_view()}
            </ul>
        }
    })
}

/// Button of a [`Panel`] that re-runs the organization lookup, then returns
/// to `return_to`.
#[derive(Debug, Clone)]
pub struct Retry {
    pub label: &'static str,
    pub return_to: String,
}

/// Centered message, optionally with the organization retry form.
#[component]
pub fn Panel(#[prop(into)] title: String, #[prop(into)] description: String, #[prop(optional)] retry: Option<Retry>) -> impl IntoView {
    view! {
        <section class="panel">
            <h2>{title}</h2>
            <p>{description}</p>
            {retry.map(|retry| view! {
                <form method="post" action=RETRY_PATH>
                    <input type="hidden" name="return_to" value=retry.return_to/>
                    <button type="submit">{retry.label}</button>
                </form>
            })}
        </section>
    }
}

/// Inline error above a form.
#[component]
pub fn Alert(#[prop(into)] message: String) -> impl IntoView {
    view! { <p class="error" role="alert">{message}</p> }
}

/// Table of display cells; `links[i]`, when present, turns the first cell of
/// row `i` into a link.
#[component]
pub fn DataTable(
    headers: &'static [&'static str],
    rows: Vec<Vec<String>>,
    #[prop(optional)] links: Vec<String>,
) -> impl IntoView {
    if rows.is_empty() {
        return view! { <p class="empty">"Aucun élément."</p> }.into_view();
    }
    view! {
        <table>
            <thead>
                <tr>{headers.iter().map(|h| view! { <th>{*h}</th> }).collect_view()}</tr>
            </thead>
            <tbody>
                {rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let href = links.get(i).cloned();
                        view! {
                            <tr>
                                {row
                                    .into_iter()
                                    .enumerate()
                                    .map(|(j, cell)| match (&href, j) {
                                        (Some(href), 0) => view! { <td><a href=href.clone()>{cell}</a></td> }.into_view(),
                                        _ => view! { <td>{cell}</td> }.into_view(),
                                    })
                                    .collect_view()}
                            </tr>
                        }
                    })
                    .collect_view()}
            </tbody>
        </table>
    }
    .into_view()
}

/// Search box for list pages.
#[component]
pub fn SearchBox(action: &'static str, #[prop(into)] query: String) -> impl IntoView {
    view! {
        <form method="get" action=action>
            <input type="search" name="q" value=query placeholder="Rechercher..."/>
            <button type="submit">"Filtrer"</button>
        </form>
    }
}

/// Labelled statistic cards.
#[component]
pub fn Stats(items: Vec<(&'static str, String)>) -> impl IntoView {
    view! {
        <section class="stats">
            {items
                .into_iter()
                .map(|(label, value)| view! {
                    <div class="stat">
                        <span>{label}</span>
                        <strong>{value}</strong>
                    </div>
                })
                .collect_view()}
        </section>
    }
}

#[component]
pub fn TextInput(
    name: &'static str,
    label: &'static str,
    #[prop(into, optional)] value: String,
    #[prop(default = "text")] kind: &'static str,
) -> impl IntoView {
    view! {
        <label>
            {label}
            <input type=kind name=name value=value/>
        </label>
    }
}

pub fn optional(value: Option<&str>) -> String {
    value.unwrap_or("—").to_string()
}
