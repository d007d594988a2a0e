//! `crm-billing`: subscription plans and the hosted checkout.
//!
//! The checkout runs with service privileges: the caller is authenticated
//! against the auth provider, their membership is checked here, and the
//! `subscriptions` row is written on the organization's behalf.

pub mod checkout;
pub mod gateway;
pub mod plan;
pub mod subscription;

pub use checkout::{CheckoutError, CheckoutService};
pub use gateway::{CheckoutRequest, CheckoutSession, CustomerRequest, GatewayError, PaymentGateway, StripeGateway};
pub use plan::{CURRENCY, PLANS, Plan};
pub use subscription::{Subscription, SubscriptionStatus};
