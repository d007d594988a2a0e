//! The four-step setup flow, one form post per step.

use std::sync::Arc;

use axum::{
    Extension, Form, Router,
    extract::Query,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use leptos::{IntoView, component, view};

use crm_infra::Notification;
use crm_onboarding::{
    FlowOutcome, Notice, ONBOARDING_PATH, OnboardingFlow, OnboardingStep, OrganizationDetails, ProfileDetails,
};

use crate::app::dto::{OnboardingForm, StepAction, StepQuery};
use crate::app::services::AppServices;
use crate::app::views::TextInput;
use crate::context::RequestSession;

pub fn router() -> Router {
    Router::new().route(ONBOARDING_PATH, get(show).post(submit))
}

async fn open_flow(services: &AppServices, session: &RequestSession, step: OnboardingStep) -> OnboardingFlow {
    // The flow prefills from, and saves to, the caller's organization if one exists.
    if let Some((identity, token)) = session.subject() {
        session.resolver().resolve(token, identity.id).await;
    }
    OnboardingFlow::at(
        step,
        session.session().clone(),
        session.resolver().clone(),
        services.onboarding.clone(),
    )
}

fn step_at(index: Option<usize>) -> OnboardingStep {
    index
        .and_then(OnboardingStep::from_index)
        .unwrap_or(OnboardingStep::Welcome)
}

pub async fn show(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    Query(query): Query<StepQuery>,
) -> Response {
    let flow = open_flow(&services, &session, step_at(query.step)).await;
    let notifications = session
        .subject()
        .map(|(identity, _)| services.data.notifications.drain(identity.id))
        .unwrap_or_default();

    let organization = session.resolver().state().ready().cloned().flatten();
    let step = flow.step();
    let (details, profile) = (flow.organization.clone(), flow.profile.clone());
    let progress = (flow.progress() * 100.0).round() as u32;
    let body = super::page(&session, organization.as_ref(), notifications, step.title(), move || {
        view! { <StepForm step=step organization=details profile=profile progress=progress/> }
    });
    Html(body).into_response()
}

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<RequestSession>,
    Form(form): Form<OnboardingForm>,
) -> Response {
    let mut flow = open_flow(&services, &session, step_at(Some(form.step))).await;
    if let Some(name) = form.name {
        flow.organization.name = name;
    }
    if let Some(description) = form.description {
        flow.organization.description = description;
    }
    if let Some(fonction) = form.fonction {
        flow.profile.fonction = fonction;
    }
    if let Some(telephone) = form.telephone {
        flow.profile.telephone = telephone;
    }

    let transition = match form.action {
        StepAction::Next => flow.next().await,
        StepAction::Skip => flow.skip().await,
        StepAction::Back => {
            let step = flow.back();
            return Redirect::to(&step_path(step)).into_response();
        }
    };

    if let (Some(notice), Some((identity, _))) = (transition.notice, session.subject()) {
        let notification = match notice {
            Notice::Saved { title, description } => Notification::success(title, description),
            Notice::Failed { description, .. } => Notification::error(description),
        };
        services.data.notifications.push(identity.id, notification);
    }
    match transition.outcome {
        FlowOutcome::Step { step } => Redirect::to(&step_path(step)).into_response(),
        FlowOutcome::Exit { redirect_to } => Redirect::to(redirect_to).into_response(),
    }
}

fn step_path(step: OnboardingStep) -> String {
    format!("{ONBOARDING_PATH}?step={}", step.index())
}

#[component]
fn StepForm(
    step: OnboardingStep,
    organization: OrganizationDetails,
    profile: ProfileDetails,
    progress: u32,
) -> impl IntoView {
    let fields = match step {
        OnboardingStep::Welcome => view! { <p>"Quelques informations suffisent pour démarrer."</p> }.into_view(),
        OnboardingStep::OrganizationDetails => view! {
            <TextInput name="name" label="Nom de l'organisation" value=organization.name/>
            <TextInput name="description" label="Description" value=organization.description/>
        }
        .into_view(),
        OnboardingStep::ProfileDetails => view! {
            <TextInput name="fonction" label="Fonction" value=profile.fonction/>
            <TextInput name="telephone" label="Téléphone" value=profile.telephone kind="tel"/>
        }
        .into_view(),
        OnboardingStep::Completion => view! { <p>"Tout est prêt."</p> }.into_view(),
    };
    let back = (step != OnboardingStep::Welcome)
        .then(|| view! { <button type="submit" name="action" value="back">"Précédent"</button> });
    let next_label = if step == OnboardingStep::Completion { "Commencer" } else { "Suivant" };
    let position = format!("Étape {} sur {}", step.index() + 1, OnboardingStep::ALL.len());

    view! {
        <p>{step.description()}</p>
        <progress max="100" value=progress.to_string()>{format!("{progress}%")}</progress>
        <p>{position}</p>
        <form method="post" action=ONBOARDING_PATH>
            <input type="hidden" name="step" value=step.index().to_string()/>
            {fields}
            {back}
            <button type="submit" name="action" value="next">{next_label}</button>
            <button type="submit" name="action" value="skip">"Passer"</button>
        </form>
    }
}
