//! Service wiring: which auth provider, store and payment gateway the server
//! talks to.

use std::sync::Arc;
use std::time::Duration;

use crm_auth::{AuthProvider, Hs256SessionValidator, ProfileSource, SessionValidator};
use crm_billing::{CheckoutService, PaymentGateway, StripeGateway};
use crm_infra::{
    DataServices, GoTrueClient, InMemoryAuthProvider, InMemoryQueryCache, InMemoryStore, PostgrestStore,
    RemoteStore, StoreMemberships, StoreOnboarding, StoreProfiles,
};
use crm_onboarding::OnboardingStore;
use crm_tenancy::MembershipSource;

use crate::config::{AppConfig, Backend, BillingConfig};

/// Process-wide collaborators shared by every request.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<dyn AuthProvider>,
    pub validator: Arc<dyn SessionValidator>,
    pub profiles: Arc<dyn ProfileSource>,
    pub memberships: Arc<dyn MembershipSource>,
    pub onboarding: Arc<dyn OnboardingStore>,
    pub data: DataServices,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    /// Wire the services selected by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let ttl = Duration::from_secs(config.cache.ttl_secs);
        match config.backend {
            Backend::Memory => {
                let store = Arc::new(InMemoryStore::new());
                let auth = Arc::new(InMemoryAuthProvider::new(store.clone(), config.jwt_secret()));
                Self::assemble(store, auth, config.jwt_secret(), ttl, gateway(&config.billing))
            }
            Backend::Supabase => {
                let supabase = &config.supabase;
                let mut store = PostgrestStore::new(supabase.url.clone(), supabase.anon_key.clone());
                if let Some(key) = &supabase.service_role_key {
                    store = store.with_service_key(key.clone());
                }
                let auth = Arc::new(GoTrueClient::new(supabase.url.clone(), supabase.anon_key.clone()));
                Self::assemble(Arc::new(store), auth, config.jwt_secret(), ttl, gateway(&config.billing))
            }
        }
    }

    /// In-memory services around an existing store and auth provider, so
    /// tests can seed rows and mint sessions.
    pub fn in_memory(store: Arc<InMemoryStore>, auth: Arc<InMemoryAuthProvider>, jwt_secret: &str) -> Self {
        Self::assemble(store, auth, jwt_secret, Duration::from_secs(30), None)
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.checkout = Arc::new(CheckoutService::new(
            self.data.store.clone(),
            self.auth.clone(),
            Some(gateway),
        ));
        self
    }

    fn assemble(
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        jwt_secret: &str,
        ttl: Duration,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let cache = Arc::new(InMemoryQueryCache::new(ttl));
        Self {
            validator: Arc::new(Hs256SessionValidator::new(jwt_secret)),
            profiles: Arc::new(StoreProfiles::new(store.clone())),
            memberships: Arc::new(StoreMemberships::new(store.clone())),
            onboarding: Arc::new(StoreOnboarding::new(store.clone())),
            checkout: Arc::new(CheckoutService::new(store.clone(), auth.clone(), gateway)),
            data: DataServices::new(store, cache),
            auth,
        }
    }
}

fn gateway(billing: &BillingConfig) -> Option<Arc<dyn PaymentGateway>> {
    match &billing.stripe_secret_key {
        Some(key) if !key.trim().is_empty() => {
            Some(Arc::new(StripeGateway::with_base_url(billing.api_base.clone(), key.clone())))
        }
        _ => {
            tracing::warn!("no payment secret configured; checkout is disabled");
            None
        }
    }
}
