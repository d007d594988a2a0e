//! Onboarding gate: users whose profile is not marked as onboarded are sent
//! to the setup flow, except on a fixed allow-list of paths.

use serde::Serialize;

use crm_core::Loadable;
use crm_auth::SessionSnapshot;

pub const ONBOARDING_PATH: &str = "/onboarding";

/// Paths never subject to the check.
pub const EXEMPT_PATHS: [&str; 3] = ["/auth", ONBOARDING_PATH, "/pricing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingDecision {
    /// Render the page.
    Pass,
    /// Render nothing (identity/profile not settled on a protected path).
    Hold,
    /// Render nothing and navigate to the onboarding flow.
    Redirect,
    /// Signed in but no profile row exists yet; render nothing and offer a
    /// manual re-check instead of waiting.
    MissingProfile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingGate {
    exempt: Vec<String>,
}

impl Default for OnboardingGate {
    fn default() -> Self {
        Self {
            exempt: EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl OnboardingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        let path = normalize(path);
        self.exempt.iter().any(|p| p == path)
    }

    /// Decision for one navigation.
    ///
    /// `pending → exempt-pass | check`, `check → pass | redirect`. A failed
    /// profile fetch counts as pending. A settled but absent profile cannot
    /// carry the completion flag, so it is reported on its own.
    pub fn evaluate(&self, session: &SessionSnapshot, path: &str) -> OnboardingDecision {
        if self.is_exempt(path) {
            return OnboardingDecision::Pass;
        }
        match (&session.identity, &session.profile) {
            (Loadable::Ready(None), _) => OnboardingDecision::Pass,
            (Loadable::Ready(Some(_)), Loadable::Ready(Some(profile))) => {
                if profile.onboarding_completed {
                    OnboardingDecision::Pass
                } else {
                    OnboardingDecision::Redirect
                }
            }
            (Loadable::Ready(Some(_)), Loadable::Ready(None)) => OnboardingDecision::MissingProfile,
            _ => OnboardingDecision::Hold,
        }
    }
}

/// Drop query/fragment and a trailing slash (except for `/`).
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
