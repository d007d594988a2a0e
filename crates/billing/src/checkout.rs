//! Hosted checkout creation for an organization's subscription.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crm_auth::{AccessToken, AuthProvider, Role};
use crm_core::OrganizationId;
use crm_infra::{Caller, RemoteStore, Select, StoreError};

use crate::gateway::{CheckoutRequest, CustomerRequest, GatewayError, PaymentGateway};
use crate::plan::Plan;
use crate::subscription::Subscription;

/// Every variant renders as the `{ "error": message }` body of the endpoint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("No authorization header provided")]
    MissingAuthorization,

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("User not authenticated or email not available")]
    MissingEmail,

    #[error("plan_id is required")]
    MissingPlan,

    #[error("User is not a member of any organization")]
    NotAMember,

    #[error("Only organization admins can manage subscriptions")]
    NotAnAdmin,

    #[error("Invalid plan_id")]
    InvalidPlan,

    #[error("STRIPE_SECRET_KEY is not set")]
    NotConfigured,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Deserialize)]
struct MemberRow {
    organization_id: OrganizationId,
    #[serde(default)]
    role: Option<String>,
}

pub struct CheckoutService {
    store: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl CheckoutService {
    /// `gateway` is `None` when no payment secret is configured; every
    /// checkout then fails with [`CheckoutError::NotConfigured`].
    pub fn new(store: Arc<dyn RemoteStore>, auth: Arc<dyn AuthProvider>, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self { store, auth, gateway }
    }

    /// Create a checkout session for `plan_id` and return its URL.
    ///
    /// The `subscriptions` row is upserted as `pending`; activation is left
    /// to the payment provider's webhook.
    pub async fn create_checkout(
        &self,
        token: Option<&AccessToken>,
        plan_id: Option<&str>,
        origin: &str,
    ) -> Result<String, CheckoutError> {
        let gateway = self.gateway.as_ref().ok_or(CheckoutError::NotConfigured)?;
        let token = token.ok_or(CheckoutError::MissingAuthorization)?;
        let identity = self
            .auth
            .user_for_token(token)
            .await
            .map_err(|e| CheckoutError::Authentication(e.to_string()))?;
        let email = identity.email.clone().ok_or(CheckoutError::MissingEmail)?;

        let plan_id = plan_id.map(str::trim).filter(|p| !p.is_empty()).ok_or(CheckoutError::MissingPlan)?;
        tracing::info!(user_id = %identity.id, plan_id, "checkout requested");

        let member = self
            .store
            .maybe_single(&Caller::Service, &Select::from("organization_members").eq("user_id", identity.id))
            .await
            .map_err(|_| CheckoutError::NotAMember)?
            .ok_or(CheckoutError::NotAMember)?;
        let member: MemberRow = serde_json::from_value(member).map_err(|_| CheckoutError::NotAMember)?;
        let organization = member.organization_id;
        if !matches!(Role::from_remote(member.role.as_deref()), Role::Admin | Role::Owner) {
            return Err(CheckoutError::NotAnAdmin);
        }

        let plan = *Plan::find(plan_id).ok_or(CheckoutError::InvalidPlan)?;

        let customer_id = match self.subscription(organization).await?.and_then(|s| s.stripe_customer_id) {
            Some(existing) => {
                tracing::info!(organization_id = %organization, "reusing payment customer");
                existing
            }
            None => {
                let created = gateway
                    .create_customer(&CustomerRequest {
                        email,
                        organization_id: organization.to_string(),
                        user_id: identity.id.to_string(),
                    })
                    .await?;
                tracing::info!(organization_id = %organization, "payment customer created");
                created
            }
        };

        let origin = origin.trim_end_matches('/');
        let session = gateway
            .create_checkout_session(&CheckoutRequest {
                customer_id: customer_id.clone(),
                plan,
                success_url: format!("{origin}/dashboard?success=true"),
                cancel_url: format!("{origin}/pricing?canceled=true"),
                organization_id: organization.to_string(),
                user_id: identity.id.to_string(),
            })
            .await?;
        tracing::info!(organization_id = %organization, session_id = %session.id, "checkout session created");

        self.store
            .upsert(
                &Caller::Service,
                "subscriptions",
                json!({
                    "organization_id": organization,
                    "stripe_customer_id": customer_id,
                    "plan_id": plan.id,
                    "plan_name": plan.name,
                    "status": "pending",
                    "updated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                }),
                "organization_id",
            )
            .await?;

        Ok(session.url)
    }

    /// The organization's subscription row, if it has one.
    pub async fn subscription(&self, organization: OrganizationId) -> Result<Option<Subscription>, CheckoutError> {
        let row = self
            .store
            .maybe_single(&Caller::Service, &Select::from("subscriptions").eq("organization_id", organization))
            .await?;
        Ok(row.and_then(|row| match serde_json::from_value(row) {
            Ok(sub) => Some(sub),
            Err(e) => {
                tracing::warn!(organization_id = %organization, error = %e, "unreadable subscription row");
                None
            }
        }))
    }
}
