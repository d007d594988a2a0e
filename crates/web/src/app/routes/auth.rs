//! Sign-in, sign-up, password reset and sign-out forms.

use std::sync::Arc;

use axum::{
    Extension, Form, Router,
    extract::Query,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Utc;
use leptos::{IntoView, view};

use crm_auth::{AuthError, LOGIN_PATH, Session, SignUpRequest};
use crm_infra::Notification;

use crate::app::dto::{AuthQuery, ResetForm, SignInForm, SignUpForm};
use crate::app::services::AppServices;
use crate::app::views::{self, Alert, TextInput};
use crate::context::RequestSession;
use crate::middleware::SESSION_COOKIE;

pub fn router() -> Router {
    Router::new()
        .route(LOGIN_PATH, get(auth_page))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/reset", post(reset_password))
        .route("/auth/sign-out", post(sign_out))
}

pub async fn auth_page(Extension(session): Extension<RequestSession>, Query(query): Query<AuthQuery>) -> Response {
    if session.subject().is_some() {
        return Redirect::to("/").into_response();
    }
    let notice = query
        .signed_out
        .is_some()
        .then(|| Notification::success("Déconnexion réussie", "Vous êtes maintenant déconnecté."));
    render(StatusCode::OK, notice, None)
}

pub async fn sign_in(Extension(services): Extension<Arc<AppServices>>, Form(form): Form<SignInForm>) -> Response {
    let session = Session::new(services.auth.clone(), services.profiles.clone());
    let outcome = session.sign_in(form.email.trim(), &form.password).await;
    let snapshot = session.snapshot();
    session.shutdown();

    if let Err(e) = outcome {
        tracing::info!(error = %e, "sign-in failed");
        return render(StatusCode::UNAUTHORIZED, None, Some(e.user_message()));
    }
    let (Some(identity), Some(token)) = (snapshot.identity(), snapshot.access_token.as_ref()) else {
        return render(StatusCode::BAD_GATEWAY, None, Some(AuthError::NotSignedIn.user_message()));
    };
    services.data.notifications.push(
        identity.id,
        Notification::success("Connexion réussie", "Vous êtes maintenant connecté."),
    );
    with_cookie(Redirect::to("/"), &session_cookie(token.as_str(), token_ttl(&services, token.as_str())))
}

pub async fn sign_up(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Form(form): Form<SignUpForm>,
) -> Response {
    let request = SignUpRequest {
        email: form.email.trim().to_string(),
        password: form.password,
        nom: form.nom.trim().to_string(),
        prenom: form.prenom.trim().to_string(),
        redirect_to: Some(format!("{}/", super::request_origin(&headers))),
    };
    let session = Session::new(services.auth.clone(), services.profiles.clone());
    let outcome = session.sign_up(&request).await;
    let snapshot = session.snapshot();
    session.shutdown();

    let notice = Notification::success("Inscription réussie", "Vérifiez votre email pour confirmer votre compte.");
    match outcome {
        Ok(true) => match (snapshot.identity(), snapshot.access_token.as_ref()) {
            (Some(identity), Some(token)) => {
                services.data.notifications.push(identity.id, notice);
                with_cookie(Redirect::to("/"), &session_cookie(token.as_str(), token_ttl(&services, token.as_str())))
            }
            _ => render(StatusCode::OK, Some(notice), None),
        },
        Ok(false) => render(StatusCode::OK, Some(notice), None),
        Err(e) => {
            tracing::info!(error = %e, "sign-up failed");
            render(StatusCode::BAD_REQUEST, None, Some(e.user_message()))
        }
    }
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Form(form): Form<ResetForm>,
) -> Response {
    let redirect_to = format!("{}{LOGIN_PATH}", super::request_origin(&headers));
    let session = Session::new(services.auth.clone(), services.profiles.clone());
    let outcome = session.reset_password(form.email.trim(), Some(&redirect_to)).await;
    session.shutdown();

    match outcome {
        Ok(()) => render(
            StatusCode::OK,
            Some(Notification::success(
                "Email envoyé",
                "Vérifiez votre email pour réinitialiser votre mot de passe.",
            )),
            None,
        ),
        Err(e) => {
            tracing::info!(error = %e, "password reset failed");
            render(StatusCode::BAD_REQUEST, None, Some(e.user_message()))
        }
    }
}

pub async fn sign_out(Extension(session): Extension<RequestSession>) -> Response {
    if let Err(e) = session.session().sign_out().await {
        // The cookie is dropped regardless; the provider session expires on its own.
        tracing::warn!(error = %e, "sign-out failed");
    }
    session.resolver().clear();
    with_cookie(
        Redirect::to(&format!("{LOGIN_PATH}?signed_out=1")),
        &format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    )
}

/// Seconds until the token expires, so the cookie does not outlive it.
fn token_ttl(services: &AppServices, token: &str) -> Option<i64> {
    let now = Utc::now();
    let claims = services.validator.validate(token, now).ok()?;
    Some(claims.exp - now.timestamp())
}

fn session_cookie(token: &str, max_age: Option<i64>) -> String {
    match max_age {
        Some(secs) => format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={secs}"),
        None => format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax"),
    }
}

fn with_cookie(response: impl IntoResponse, cookie: &str) -> Response {
    let mut response = response.into_response();
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "unencodable session cookie"),
    }
    response
}

fn render(status: StatusCode, notice: Option<Notification>, error: Option<String>) -> Response {
    let body = views::document("Authentification".to_string(), None, notice.into_iter().collect(), move || {
        view! {
            {error.map(|message| view! { <Alert message=message/> })}
            <section>
                <h2>"Connexion"</h2>
                <form method="post" action="/auth/sign-in">
                    <TextInput name="email" label="Email" kind="email"/>
                    <TextInput name="password" label="Mot de passe" kind="password"/>
                    <button type="submit">"Se connecter"</button>
                </form>
            </section>
            <section>
                <h2>"Inscription"</h2>
                <form method="post" action="/auth/sign-up">
                    <TextInput name="prenom" label="Prénom"/>
                    <TextInput name="nom" label="Nom"/>
                    <TextInput name="email" label="Email" kind="email"/>
                    <TextInput name="password" label="Mot de passe" kind="password"/>
                    <button type="submit">"S'inscrire"</button>
                </form>
            </section>
            <section>
                <h2>"Mot de passe oublié"</h2>
                <form method="post" action="/auth/reset">
                    <TextInput name="email" label="Email" kind="email"/>
                    <button type="submit">"Réinitialiser"</button>
                </form>
            </section>
        }
    });
    (status, Html(body)).into_response()
}
