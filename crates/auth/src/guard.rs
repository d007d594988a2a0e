//! Route guard: authentication and minimum-role check for a page.

use serde::Serialize;

use crm_core::Loadable;

use crate::{Role, SessionSnapshot};

pub const LOGIN_PATH: &str = "/auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    /// Identity (or, for role-restricted routes, the profile) is still resolving.
    Loading,
    /// No identity: send the user to the login screen.
    RedirectToLogin,
    /// Signed in but the role rank is too low; shown inline, no redirect.
    AccessDenied,
    Allow,
}

/// Guard for one route, optionally requiring a minimum role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteGuard {
    required: Option<Role>,
}

impl RouteGuard {
    pub fn authenticated() -> Self {
        Self { required: None }
    }

    pub fn with_role(required: Role) -> Self {
        Self { required: Some(required) }
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required
    }

    pub fn evaluate(&self, session: &SessionSnapshot) -> GuardDecision {
        let identity = match &session.identity {
            Loadable::Loading => return GuardDecision::Loading,
            Loadable::Ready(identity) => identity,
            // A failed identity lookup is indistinguishable from being signed out.
            Loadable::Failed(_) => &None,
        };
        if identity.is_none() {
            return GuardDecision::RedirectToLogin;
        }

        let Some(required) = self.required else {
            return GuardDecision::Allow;
        };
        match &session.profile {
            Loadable::Loading => GuardDecision::Loading,
            Loadable::Ready(Some(profile)) if profile.role.satisfies(required) => GuardDecision::Allow,
            Loadable::Ready(_) | Loadable::Failed(_) => GuardDecision::AccessDenied,
        }
    }
}
