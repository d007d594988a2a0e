use serde::Deserialize;

use crm_core::{Cents, RecordId};
use crm_sales::NewDevisItem;

/// `?q=` filter of list pages.
#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub q: Option<String>,
}

impl ListFilter {
    /// Lower-cased, trimmed needle; `None` when empty.
    pub fn needle(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// Body of `POST /api/devis/:id/items`; the quote comes from the path.
#[derive(Debug, Deserialize)]
pub struct DevisItemInput {
    #[serde(default)]
    pub catalogue_id: Option<RecordId>,
    pub quantite: f64,
    #[serde(default)]
    pub prix_unitaire: Option<Cents>,
    #[serde(default)]
    pub remise: Option<f64>,
}

impl DevisItemInput {
    pub fn into_item(self, devis_id: RecordId) -> NewDevisItem {
        NewDevisItem {
            devis_id,
            catalogue_id: self.catalogue_id,
            quantite: self.quantite,
            prix_unitaire: self.prix_unitaire,
            remise: self.remise,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RetryForm {
    #[serde(default)]
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub prenom: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetForm {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    #[serde(default)]
    pub signed_out: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StepQuery {
    #[serde(default)]
    pub step: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Next,
    Back,
    Skip,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingForm {
    pub step: usize,
    pub action: StepAction,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fonction: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Only local absolute paths are accepted as redirect targets.
pub fn local_path(candidate: Option<&str>) -> &str {
    match candidate {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}
