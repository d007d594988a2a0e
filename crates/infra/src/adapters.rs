//! Store-backed implementations of the auth, tenancy and onboarding ports.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crm_auth::{AccessToken, AuthError, Profile, ProfilePatch, ProfileSource};
use crm_core::{OrganizationId, Relation, UserId, Validate};
use crm_onboarding::{OnboardingError, OnboardingStore};
use crm_tenancy::{LookupError, Membership, MembershipSource, Organization, OrganizationPatch, ResolvedOrganization};

use crate::store::{Caller, Filter, RemoteStore, Select};

const ORGANIZATION: Relation = Relation {
    table: "organizations",
    foreign_key: "organization_id",
    columns: &["*"],
};

/// Reads `profiles` by id.
pub struct StoreProfiles {
    store: Arc<dyn RemoteStore>,
}

impl StoreProfiles {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProfileSource for StoreProfiles {
    async fn fetch_profile(&self, token: &AccessToken, user: UserId) -> Result<Option<Profile>, AuthError> {
        let caller = Caller::user(token.clone(), user);
        let row = self
            .store
            .maybe_single(&caller, &Select::from("profiles").eq("id", user))
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))?;
        row.map(serde_json::from_value)
            .transpose()
            .map_err(|e| AuthError::Profile(e.to_string()))
    }
}

/// Resolves the caller's membership with its organization embedded.
pub struct StoreMemberships {
    store: Arc<dyn RemoteStore>,
}

impl StoreMemberships {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct MembershipRow {
    #[serde(flatten)]
    membership: Membership,
    organizations: Option<Organization>,
}

#[async_trait]
impl MembershipSource for StoreMemberships {
    async fn membership_for(&self, token: &AccessToken, user: UserId) -> Result<Option<ResolvedOrganization>, LookupError> {
        let caller = Caller::user(token.clone(), user);
        let query = Select::from("organization_members")
            .embed(&[ORGANIZATION])
            .eq("user_id", user);
        let mut rows = self
            .store
            .select(&caller, &query)
            .await
            .map_err(|e| LookupError::Remote(e.to_string()))?;
        if rows.len() > 1 {
            return Err(LookupError::MultipleMemberships);
        }
        let Some(row) = rows.pop() else { return Ok(None) };

        let row: MembershipRow = serde_json::from_value(row).map_err(|e| LookupError::Remote(e.to_string()))?;
        match row.organizations {
            Some(organization) => Ok(Some(ResolvedOrganization {
                organization,
                membership: row.membership,
            })),
            // Membership row exists but its organization isn't readable yet.
            None => Ok(None),
        }
    }
}

/// Writes made by the onboarding flow (and the settings page).
pub struct StoreOnboarding {
    store: Arc<dyn RemoteStore>,
}

impl StoreOnboarding {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    async fn patch(&self, caller: Caller, table: &str, id: String, body: JsonValue) -> Result<(), OnboardingError> {
        let updated = self
            .store
            .update(&caller, table, &[Filter::eq("id", id)], body)
            .await
            .map_err(|e| OnboardingError::Remote(e.to_string()))?;
        if updated.is_empty() {
            return Err(OnboardingError::Remote(format!("no visible {table} row to update")));
        }
        Ok(())
    }
}

#[async_trait]
impl OnboardingStore for StoreOnboarding {
    async fn update_organization(
        &self,
        token: &AccessToken,
        user: UserId,
        organization: OrganizationId,
        patch: &OrganizationPatch,
    ) -> Result<(), OnboardingError> {
        patch.validate()?;
        let body = serde_json::to_value(patch).map_err(|e| OnboardingError::Remote(e.to_string()))?;
        self.patch(Caller::user(token.clone(), user), "organizations", organization.to_string(), body)
            .await
    }

    async fn update_profile(&self, token: &AccessToken, user: UserId, patch: &ProfilePatch) -> Result<(), OnboardingError> {
        let body = serde_json::to_value(patch).map_err(|e| OnboardingError::Remote(e.to_string()))?;
        self.patch(Caller::user(token.clone(), user), "profiles", user.to_string(), body)
            .await
    }
}
