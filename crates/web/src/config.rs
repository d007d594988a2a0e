//! Layered configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`CRM_*` prefix, `__` separates sections, e.g.
//!    `CRM_SUPABASE__URL` -> `supabase.url`)
//! 2. `crm.toml` in the working directory
//! 3. Built-in defaults (in-memory backend on `0.0.0.0:8080`)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_observability::LogFormat;

pub const CONFIG_FILE: &str = "crm.toml";

/// Secret used by the in-memory backend when none is configured.
pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("missing required setting `{0}` for the supabase backend")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process store and auth provider (dev, tests).
    #[default]
    Memory,
    /// Hosted PostgREST + GoTrue project.
    Supabase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default)]
    pub service_role_key: Option<String>,
    /// HS256 secret the project signs access tokens with.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Checkout is disabled when unset.
    #[serde(default)]
    pub stripe_secret_key: Option<String>,
    #[serde(default = "default_stripe_base")]
    pub api_base: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            api_base: default_stripe_base(),
        }
    }
}

fn default_stripe_base() -> String {
    crm_billing::gateway::STRIPE_API_BASE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a list read stays fresh.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Signing secret for the in-memory backend's tokens.
    #[serde(default)]
    pub dev_jwt_secret: Option<String>,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            backend: Backend::Memory,
            log_format: LogFormat::Json,
            dev_jwt_secret: None,
            supabase: SupabaseConfig::default(),
            billing: BillingConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CRM_").split("__"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend != Backend::Supabase {
            return Ok(());
        }
        if self.supabase.url.trim().is_empty() {
            return Err(ConfigError::Missing("supabase.url"));
        }
        if self.supabase.anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("supabase.anon_key"));
        }
        if self.supabase.jwt_secret.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(ConfigError::Missing("supabase.jwt_secret"));
        }
        Ok(())
    }

    /// Secret access tokens are verified with.
    pub fn jwt_secret(&self) -> &str {
        match self.backend {
            Backend::Supabase => self.supabase.jwt_secret.as_deref().unwrap_or_default(),
            Backend::Memory => match self.dev_jwt_secret.as_deref() {
                Some(secret) => secret,
                None => {
                    tracing::warn!("no dev_jwt_secret configured; using insecure dev default");
                    DEV_JWT_SECRET
                }
            },
        }
    }
}
