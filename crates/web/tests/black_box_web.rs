use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use crm_auth::SessionClaims;
use crm_core::{OrganizationId, RecordId, UserId};
use crm_infra::{InMemoryAuthProvider, InMemoryStore};
use crm_web::app::{build_router, services::AppServices};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{StatusCode, header};
use serde_json::json;

const JWT_SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory backend, ephemeral port.
        let store = Arc::new(InMemoryStore::new());
        let auth = Arc::new(InMemoryAuthProvider::new(store.clone(), JWT_SECRET));
        let app = build_router(AppServices::in_memory(store.clone(), auth, JWT_SECRET));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, store, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A `profiles` row for a new user; returns the user and a signed token.
    fn user(&self, role: &str, onboarded: bool) -> (UserId, String) {
        let user = UserId::new();
        let email = format!("{user}@example.fr");
        self.store
            .seed(
                "profiles",
                json!({
                    "id": user,
                    "email": email,
                    "nom": "Martin",
                    "prenom": "Claire",
                    "role": role,
                    "onboarding_completed": onboarded,
                }),
            )
            .unwrap();
        (user, mint_jwt(user, &email))
    }

    /// An organization with `user` as its only member.
    fn organization(&self, user: UserId, name: &str) -> OrganizationId {
        let organization = OrganizationId::new();
        self.store
            .seed(
                "organizations",
                json!({
                    "id": organization,
                    "name": name,
                    "slug": format!("org-{}", &organization.to_string()[..8]),
                }),
            )
            .unwrap();
        self.store
            .seed(
                "organization_members",
                json!({
                    "id": RecordId::new(),
                    "organization_id": organization,
                    "user_id": user,
                    "role": "owner",
                }),
            )
            .unwrap();
        organization
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user: UserId, email: &str) -> String {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user,
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn location(res: &reqwest::Response) -> &str {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;

    let res = client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn anonymous_page_request_redirects_to_login() {
    let server = TestServer::spawn().await;

    let res = client().get(server.url("/contacts")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/auth");
}

#[tokio::test]
async fn anonymous_api_request_is_401() {
    let server = TestServer::spawn().await;

    let res = client().get(server.url("/api/contacts")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn tampered_token_counts_as_signed_out() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("user", true);

    let res = client()
        .get(server.url("/contacts"))
        .bearer_auth(format!("{token}x"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/auth");
}

#[tokio::test]
async fn user_without_organization_sees_provisioning_panel() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("user", true);

    let res = client().get(server.url("/")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("Organisation en cours de création"));
    assert!(body.contains("Vérifier à nouveau"));
}

#[tokio::test]
async fn retry_goes_back_once_the_organization_exists() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("user", true);
    let res = client().get(server.url("/contacts")).bearer_auth(&token).send().await.unwrap();
    assert!(res.text().await.unwrap().contains("Organisation en cours de création"));

    server.organization(user, "Atelier Martin");
    let res = client()
        .post(server.url("/organization/retry"))
        .bearer_auth(&token)
        .form(&[("return_to", "/contacts")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/contacts");

    let res = client().get(server.url("/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn signed_in_without_profile_row_sees_a_panel_not_a_bare_503() {
    let server = TestServer::spawn().await;
    let user = UserId::new();
    let token = mint_jwt(user, "sans-profil@example.fr");
    server.organization(user, "Atelier Martin");

    let res = client().get(server.url("/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("Profil en cours de création"));
    assert!(body.contains("Vérifier à nouveau"));

    let res = client().get(server.url("/api/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "profile_missing");
}

#[tokio::test]
async fn api_without_organization_is_409() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("user", true);

    let res = client().get(server.url("/api/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn incomplete_onboarding_redirects_to_the_flow() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("admin", false);
    server.organization(user, "Atelier Martin");

    let res = client().get(server.url("/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/onboarding");

    // The flow itself stays reachable.
    let res = client().get(server.url("/onboarding")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("Étape 1 sur 4"));
}

#[tokio::test]
async fn onboarding_completion_unlocks_pages() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("admin", false);
    server.organization(user, "Atelier Martin");
    let client = client();

    let res = client
        .post(server.url("/onboarding"))
        .bearer_auth(&token)
        .form(&[("step", "3"), ("action", "next")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    let res = client.get(server.url("/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn plain_user_is_denied_settings() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("user", true);
    server.organization(user, "Atelier Martin");

    let res = client().get(server.url("/settings")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.text().await.unwrap().contains("Accès refusé"));

    let res = client().get(server.url("/kpi")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_reaches_settings() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("admin", true);
    server.organization(user, "Atelier Martin");

    let res = client().get(server.url("/settings")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("Atelier Martin"));
}

#[tokio::test]
async fn contacts_api_create_then_list() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("user", true);
    let organization = server.organization(user, "Atelier Martin");
    let client = client();

    let res = client
        .post(server.url("/api/contacts"))
        .bearer_auth(&token)
        .json(&json!({ "nom": "Dupont", "prenom": "Jean", "email": "jean.dupont@example.fr" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["nom"], "Dupont");
    assert_eq!(created["organization_id"], organization.to_string());

    let res = client.get(server.url("/api/contacts")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rows: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(rows.len(), 1);

    let res = client
        .get(server.url("/contacts?q=dupont"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("Jean Dupont"));
}

#[tokio::test]
async fn invalid_contact_is_rejected() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("user", true);
    server.organization(user, "Atelier Martin");

    let res = client()
        .post(server.url("/api/contacts"))
        .bearer_auth(&token)
        .json(&json!({ "nom": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let server = TestServer::spawn().await;
    let (alice, alice_token) = server.user("user", true);
    server.organization(alice, "Alpha");
    let (bob, bob_token) = server.user("user", true);
    server.organization(bob, "Beta");
    let client = client();

    let res = client
        .post(server.url("/api/entreprises"))
        .bearer_auth(&alice_token)
        .json(&json!({ "raison_sociale": "Alpha Conseil" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = client.get(server.url("/api/entreprises")).bearer_auth(&bob_token).send().await.unwrap();
    let rows: Vec<serde_json::Value> = res.json().await.unwrap();
    assert!(rows.is_empty());

    let res = client
        .get(server.url(&format!("/api/entreprises/{id}")))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quote_lines_require_a_visible_quote() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("user", true);
    server.organization(user, "Atelier Martin");

    let res = client()
        .post(server.url(&format!("/api/devis/{}/items", RecordId::new())))
        .bearer_auth(&token)
        .json(&json!({ "quantite": 2.0, "prix_unitaire": 50.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_without_payment_key_reports_it() {
    let server = TestServer::spawn().await;
    let (user, token) = server.user("admin", true);
    server.organization(user, "Atelier Martin");

    let res = client()
        .post(server.url("/api/billing/checkout"))
        .bearer_auth(&token)
        .json(&json!({ "plan_id": "pro" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "STRIPE_SECRET_KEY is not set" }));
}

#[tokio::test]
async fn pricing_page_lists_plans() {
    let server = TestServer::spawn().await;

    let res = client().get(server.url("/pricing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("Choisissez votre plan"));
    assert!(body.contains("Enterprise"));
}

#[tokio::test]
async fn unknown_path_is_404_page() {
    let server = TestServer::spawn().await;

    let res = client().get(server.url("/nulle-part")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().await.unwrap().contains("Page introuvable"));
}
