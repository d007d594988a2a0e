//! Payment gateway port and its Stripe implementation.
//!
//! Stripe takes `application/x-www-form-urlencoded` bodies with bracketed
//! keys for nested objects (`metadata[plan_id]`, `line_items[0][quantity]`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::plan::{CURRENCY, Plan};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
const STRIPE_API_VERSION: &str = "2023-10-16";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("payment gateway unreachable: {0}")]
    Transport(String),

    #[error("unexpected payment gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRequest {
    pub email: String,
    pub organization_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub plan: Plan,
    pub success_url: String,
    pub cancel_url: String,
    pub organization_id: String,
    pub user_id: String,
}

impl CheckoutRequest {
    pub fn mode(&self) -> &'static str {
        if self.plan.is_recurring() { "subscription" } else { "payment" }
    }

    /// Form fields of a checkout-session creation call.
    pub fn form(&self) -> Vec<(String, String)> {
        let item = "line_items[0]";
        let mut fields = vec![
            ("customer".to_string(), self.customer_id.clone()),
            (format!("{item}[price_data][currency]"), CURRENCY.to_string()),
            (
                format!("{item}[price_data][product_data][name]"),
                format!("Abonnement {}", self.plan.name),
            ),
            (
                format!("{item}[price_data][product_data][description]"),
                format!("Accès complet aux fonctionnalités {}", self.plan.name),
            ),
            (format!("{item}[price_data][unit_amount]"), self.plan.price_cents.to_string()),
            (format!("{item}[quantity]"), "1".to_string()),
            ("mode".to_string(), self.mode().to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("metadata[organization_id]".to_string(), self.organization_id.clone()),
            ("metadata[plan_id]".to_string(), self.plan.id.to_string()),
            ("metadata[user_id]".to_string(), self.user_id.clone()),
        ];
        if self.plan.is_recurring() {
            fields.push((format!("{item}[price_data][recurring][interval]"), "month".to_string()));
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the new customer's id.
    async fn create_customer(&self, request: &CustomerRequest) -> Result<String, GatewayError>;

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

pub struct StripeGateway {
    http: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base_url(STRIPE_API_BASE, secret_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> Result<T, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .form(form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        if !(200..300).contains(&status) {
            let parsed: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
            return Err(GatewayError::Rejected {
                status,
                message: parsed.error.message.unwrap_or(body),
            });
        }
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(&self, request: &CustomerRequest) -> Result<String, GatewayError> {
        let form = [
            ("email".to_string(), request.email.clone()),
            ("metadata[organization_id]".to_string(), request.organization_id.clone()),
            ("metadata[user_id]".to_string(), request.user_id.clone()),
        ];
        let created: Created = self.post("customers", &form).await?;
        Ok(created.id)
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        self.post("checkout/sessions", &request.form()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request(plan: &str) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: "cus_1".to_string(),
            plan: *Plan::find(plan).unwrap(),
            success_url: "http://app/dashboard?success=true".to_string(),
            cancel_url: "http://app/pricing?canceled=true".to_string(),
            organization_id: "org".to_string(),
            user_id: "usr".to_string(),
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn paid_plans_are_monthly_subscriptions() {
        let form = request("pro").form();
        assert_eq!(field(&form, "mode"), Some("subscription"));
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("2900"));
        assert_eq!(field(&form, "line_items[0][price_data][recurring][interval]"), Some("month"));
        assert_eq!(field(&form, "line_items[0][price_data][product_data][name]"), Some("Abonnement Pro"));
    }

    #[test]
    fn free_plan_is_a_one_off_payment() {
        let form = request("free").form();
        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "line_items[0][price_data][recurring][interval]"), None);
    }

    #[tokio::test]
    async fn checkout_session_is_posted_as_a_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .header("authorization", "Bearer sk_test")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body_includes("mode=subscription")
                    .body_includes("customer=cus_1");
                then.status(200)
                    .json_body(json!({ "id": "cs_1", "url": "https://checkout.example/cs_1" }));
            })
            .await;

        let gateway = StripeGateway::with_base_url(server.base_url(), "sk_test");
        let session = gateway.create_checkout_session(&request("pro")).await.unwrap();
        assert_eq!(session.url, "https://checkout.example/cs_1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn gateway_error_messages_are_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/customers");
                then.status(402).json_body(json!({ "error": { "message": "Your card was declined." } }));
            })
            .await;

        let gateway = StripeGateway::with_base_url(server.base_url(), "sk_test");
        let err = gateway
            .create_customer(&CustomerRequest {
                email: "ana@exemple.fr".to_string(),
                organization_id: "org".to_string(),
                user_id: "usr".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Your card was declined.");
    }
}
